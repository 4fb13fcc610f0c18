//! Structural rewrites across derived tables.
use std::collections::HashSet;

use super::scope::output_name;
use super::OptimizationPass;
use crate::ast::types::*;
use crate::ast::visit::{
    and_all, column_refs, conjuncts, expr_subqueries, for_each_select, for_each_select_mut_pre,
    select_exprs, transform_expr, walk_expr,
};
use crate::error::Result;

/// Moves WHERE conjuncts into the derived table they exclusively reference.
pub struct PushdownPredicates;

impl OptimizationPass for PushdownPredicates {
    fn name(&self) -> &str {
        "pushdown_predicates"
    }

    fn description(&self) -> &str {
        "Pushes single-source WHERE conjuncts into derived tables"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        for_each_select_mut_pre(&mut query, &mut pushdown_select);
        Ok(query)
    }
}

/// Whether a derived table's rows are unaffected by filtering them earlier.
fn accepts_pushdown(inner: &SelectQuery) -> bool {
    let windowed = select_exprs(inner).iter().any(|e| {
        let mut found = false;
        walk_expr(e, &mut |x| {
            if matches!(x, Expression::WindowFunction { .. }) {
                found = true;
            }
        });
        found
    });
    !inner.distinct
        && !windowed
        && !inner.has_aggregates()
        && inner.group_by.is_empty()
        && inner.limit.is_none()
        && inner.offset.is_none()
        && inner.set_op.is_none()
        && inner.windows.is_empty()
}

fn is_pushable(pred: &Expression) -> bool {
    let mut ok = expr_subqueries(pred).is_empty() && !pred.contains_aggregate();
    walk_expr(pred, &mut |e| {
        if matches!(
            e,
            Expression::Raw(_) | Expression::WindowFunction { .. } | Expression::Parameter(_)
        ) {
            ok = false;
        }
    });
    ok
}

fn pushdown_select(select: &mut SelectQuery) {
    let filter = match select.filter.take() {
        Some(filter) => filter,
        None => return,
    };

    let preserves_from = !select
        .joins
        .iter()
        .any(|j| matches!(j.join_type, JoinType::Right | JoinType::Full));
    let single_source = select.from.len() + select.joins.len() == 1;

    let parts: Vec<Expression> = conjuncts(&filter).into_iter().cloned().collect();
    let mut remaining = Vec::new();
    for part in parts {
        if !push_conjunct(select, &part, preserves_from, single_source) {
            remaining.push(part);
        }
    }
    select.filter = and_all(remaining);
}

fn push_conjunct(
    select: &mut SelectQuery,
    pred: &Expression,
    preserves_from: bool,
    single_source: bool,
) -> bool {
    if !is_pushable(pred) {
        return false;
    }
    let refs = column_refs(pred);
    if refs.is_empty() {
        return false;
    }

    // Every reference must point at the same source.
    let qualifier: Option<String> = match refs[0].0 {
        Some(q) => Some(q.to_string()),
        None if single_source => None,
        None => return false,
    };
    let same_target = refs.iter().all(|(t, _)| match (t, &qualifier) {
        (Some(t), Some(q)) => t.eq_ignore_ascii_case(q),
        (None, _) => single_source,
        (Some(_), None) => single_source,
    });
    if !same_target {
        return false;
    }

    let candidates = select
        .from
        .iter_mut()
        .filter(|_| preserves_from)
        .chain(
            select
                .joins
                .iter_mut()
                .filter(|j| matches!(j.join_type, JoinType::Inner | JoinType::Cross))
                .map(|j| &mut j.table),
        );

    for table in candidates {
        let (query, alias) = match table {
            TableRef::Subquery { query, alias } => (query, alias),
            _ => continue,
        };
        let targeted = match &qualifier {
            Some(q) => alias.eq_ignore_ascii_case(q),
            None => single_source,
        };
        if !targeted {
            continue;
        }
        let inner = match query.as_mut() {
            Query::Select(inner) if accepts_pushdown(inner) => inner,
            _ => return false,
        };
        let rewritten = match map_to_inner(pred, inner) {
            Some(expr) => expr,
            None => return false,
        };
        let mut parts: Vec<Expression> = inner
            .filter
            .take()
            .map(|f| conjuncts(&f).into_iter().cloned().collect())
            .unwrap_or_default();
        parts.push(rewritten);
        inner.filter = and_all(parts);
        return true;
    }
    false
}

/// Rewrite outer column references into the derived table's projections.
fn map_to_inner(pred: &Expression, inner: &SelectQuery) -> Option<Expression> {
    let single_inner_source = inner.from.len() + inner.joins.len() == 1;
    let mut failed = false;
    let mut out = pred.clone();
    transform_expr(&mut out, &mut |e| match e {
        Expression::Column { name, .. } => match resolve_output(inner, &name, single_inner_source) {
            Some(mapped) => mapped,
            None => {
                failed = true;
                Expression::Column { table: None, name }
            }
        },
        other => other,
    });
    if failed {
        None
    } else {
        Some(out)
    }
}

fn resolve_output(inner: &SelectQuery, name: &str, single_source: bool) -> Option<Expression> {
    for item in &inner.projections {
        match item {
            SelectItem::Expression { expr, .. } => {
                if output_name(item).map_or(false, |n| n.eq_ignore_ascii_case(name)) {
                    return Some(expr.clone());
                }
            }
            SelectItem::Wildcard if single_source => {
                return Some(Expression::column(None, name));
            }
            SelectItem::QualifiedWildcard(q) if single_source => {
                return Some(Expression::column(Some(q), name));
            }
            _ => {}
        }
    }
    None
}

/// Removes derived-table projections the enclosing query never reads.
pub struct PruneProjections;

impl OptimizationPass for PruneProjections {
    fn name(&self) -> &str {
        "prune_projections"
    }

    fn description(&self) -> &str {
        "Drops unused columns from derived tables"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        for_each_select_mut_pre(&mut query, &mut prune_select);
        Ok(query)
    }
}

/// Column references made by `select` itself, including correlated
/// references from its expression subqueries, as lowercased `(qualifier, name)`.
fn outer_references(select: &SelectQuery) -> HashSet<(Option<String>, String)> {
    let mut refs = HashSet::new();
    let mut record = |expr: &Expression| {
        for (table, name) in column_refs(expr) {
            refs.insert((table.map(|t| t.to_lowercase()), name.to_lowercase()));
        }
    };
    for expr in select_exprs(select) {
        record(expr);
        for q in expr_subqueries(expr) {
            for_each_select(q, &mut |nested| {
                for e in select_exprs(nested) {
                    record(e);
                }
            });
        }
    }
    refs
}

fn prune_select(select: &mut SelectQuery) {
    let star = select
        .projections
        .iter()
        .any(|p| matches!(p, SelectItem::Wildcard | SelectItem::QualifiedWildcard(_)));
    let merged = select
        .joins
        .iter()
        .any(|j| matches!(j.condition, Some(JoinCondition::Using(_) | JoinCondition::Natural)));
    if star || merged {
        return;
    }

    let refs = outer_references(select);
    let tables = select
        .from
        .iter_mut()
        .chain(select.joins.iter_mut().map(|j| &mut j.table));
    for table in tables {
        if let TableRef::Subquery { query, alias } = table {
            if let Query::Select(inner) = query.as_mut() {
                let alias = alias.to_lowercase();
                let wanted: HashSet<String> = refs
                    .iter()
                    .filter(|(q, _)| q.as_ref().map_or(true, |q| *q == alias))
                    .map(|(_, name)| name.clone())
                    .collect();
                prune_inner(inner, &wanted);
            }
        }
    }
}

fn prune_inner(inner: &mut SelectQuery, wanted: &HashSet<String>) {
    let prunable = !inner.distinct
        && inner.set_op.is_none()
        && !(inner.has_aggregates() && inner.group_by.is_empty())
        && inner
            .projections
            .iter()
            .all(|p| matches!(p, SelectItem::Expression { .. }));
    if !prunable {
        return;
    }

    // Aliases may be referenced by the derived table's own trailing clauses.
    let mut keep = wanted.clone();
    for expr in inner
        .order_by
        .iter()
        .map(|o| &o.expr)
        .chain(inner.group_by.iter())
        .chain(inner.having.iter())
    {
        for (_, name) in column_refs(expr) {
            keep.insert(name.to_lowercase());
        }
    }

    let before = inner.projections.len();
    let mut retained: Vec<SelectItem> = inner
        .projections
        .iter()
        .filter(|item| match output_name(item) {
            Some(name) => keep.contains(&name.to_lowercase()),
            None => true,
        })
        .cloned()
        .collect();
    if retained.is_empty() && before > 0 {
        retained.push(inner.projections[0].clone());
    }
    inner.projections = retained;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::compiler::compile;
    use crate::ast::parser::parse_single;

    fn run(pass: &dyn OptimizationPass, sql: &str) -> String {
        let query = parse_single(sql, None).unwrap();
        compile(&pass.transform(query).unwrap())
    }

    #[test]
    fn test_pushdown_into_derived_table() {
        assert_eq!(
            run(
                &PushdownPredicates,
                "SELECT s.x FROM (SELECT a AS x, b FROM t) AS s WHERE s.x > 1 AND s.b = 2"
            ),
            "SELECT s.x FROM (SELECT a AS x, b FROM t WHERE a > 1 AND b = 2) AS s"
        );
    }

    #[test]
    fn test_pushdown_keeps_cross_source_predicates() {
        let sql = "SELECT * FROM (SELECT a FROM t) AS s JOIN u ON s.a = u.a WHERE s.a = u.b";
        assert_eq!(run(&PushdownPredicates, sql), sql);
    }

    #[test]
    fn test_pushdown_skips_aggregates() {
        let sql = "SELECT * FROM (SELECT a, COUNT(*) AS n FROM t GROUP BY a) AS s WHERE s.n > 1";
        assert_eq!(run(&PushdownPredicates, sql), sql);
    }

    #[test]
    fn test_pushdown_unqualified_single_source() {
        assert_eq!(
            run(
                &PushdownPredicates,
                "SELECT x FROM (SELECT * FROM t) AS s WHERE x = 1"
            ),
            "SELECT x FROM (SELECT * FROM t WHERE x = 1) AS s"
        );
    }

    #[test]
    fn test_prune_unused_projections() {
        assert_eq!(
            run(
                &PruneProjections,
                "SELECT s.a FROM (SELECT a, b, c FROM t) AS s"
            ),
            "SELECT s.a FROM (SELECT a FROM t) AS s"
        );
    }

    #[test]
    fn test_prune_keeps_correlated_references() {
        let sql = "SELECT s.a FROM (SELECT a, b FROM t) AS s WHERE EXISTS (SELECT 1 FROM u WHERE u.x = s.b)";
        assert_eq!(run(&PruneProjections, sql), sql);
    }

    #[test]
    fn test_prune_skips_star_outer() {
        let sql = "SELECT * FROM (SELECT a, b FROM t) AS s";
        assert_eq!(run(&PruneProjections, sql), sql);
    }
}
