//! Traversal helpers over the unified AST.
//!
//! Expression walkers stop at subquery boundaries; the `for_each_select*`
//! functions are the ones that descend into nested queries.
use super::types::*;

/// Direct child expressions, excluding anything inside a nested query.
pub fn children(expr: &Expression) -> Vec<&Expression> {
    match expr {
        Expression::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        Expression::UnaryOp { expr, .. }
        | Expression::IsNull { expr, .. }
        | Expression::IsBool { expr, .. }
        | Expression::Cast { expr, .. }
        | Expression::TypeCast { expr, .. }
        | Expression::InSubquery { expr, .. } => vec![expr.as_ref()],
        Expression::Nested(inner) => vec![inner.as_ref()],
        Expression::Interval { value, .. } => vec![value.as_ref()],
        Expression::Function { args, .. } => args.iter().collect(),
        Expression::Aggregate { args, filter, .. } => {
            let mut out: Vec<&Expression> = args.iter().collect();
            if let Some(f) = filter {
                out.push(f.as_ref());
            }
            out
        }
        Expression::WindowFunction { function, window } => {
            let mut out: Vec<&Expression> = vec![function.as_ref()];
            out.extend(window.partition_by.iter());
            out.extend(window.order_by.iter().map(|o| &o.expr));
            out
        }
        Expression::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            let mut out = Vec::new();
            if let Some(op) = operand {
                out.push(op.as_ref());
            }
            for (cond, result) in when_clauses {
                out.push(cond);
                out.push(result);
            }
            if let Some(e) = else_clause {
                out.push(e.as_ref());
            }
            out
        }
        Expression::InList { expr, list, .. } => {
            let mut out: Vec<&Expression> = vec![expr.as_ref()];
            out.extend(list.iter());
            out
        }
        Expression::Between {
            expr, low, high, ..
        } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
        Expression::Array(items) => items.iter().collect(),
        Expression::JsonAccess { expr, path, .. } => vec![expr.as_ref(), path.as_ref()],
        Expression::Column { .. }
        | Expression::Literal(_)
        | Expression::Subquery(_)
        | Expression::Exists(_)
        | Expression::Wildcard
        | Expression::Parameter(_)
        | Expression::TypedString { .. }
        | Expression::Raw(_) => Vec::new(),
    }
}

pub fn children_mut(expr: &mut Expression) -> Vec<&mut Expression> {
    match expr {
        Expression::BinaryOp { left, right, .. } => vec![left.as_mut(), right.as_mut()],
        Expression::UnaryOp { expr, .. }
        | Expression::IsNull { expr, .. }
        | Expression::IsBool { expr, .. }
        | Expression::Cast { expr, .. }
        | Expression::TypeCast { expr, .. }
        | Expression::InSubquery { expr, .. } => vec![expr.as_mut()],
        Expression::Nested(inner) => vec![inner.as_mut()],
        Expression::Interval { value, .. } => vec![value.as_mut()],
        Expression::Function { args, .. } => args.iter_mut().collect(),
        Expression::Aggregate { args, filter, .. } => {
            let mut out: Vec<&mut Expression> = args.iter_mut().collect();
            if let Some(f) = filter {
                out.push(f.as_mut());
            }
            out
        }
        Expression::WindowFunction { function, window } => {
            let mut out: Vec<&mut Expression> = vec![function.as_mut()];
            out.extend(window.partition_by.iter_mut());
            out.extend(window.order_by.iter_mut().map(|o| &mut o.expr));
            out
        }
        Expression::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            let mut out = Vec::new();
            if let Some(op) = operand {
                out.push(op.as_mut());
            }
            for (cond, result) in when_clauses.iter_mut() {
                out.push(cond);
                out.push(result);
            }
            if let Some(e) = else_clause {
                out.push(e.as_mut());
            }
            out
        }
        Expression::InList { expr, list, .. } => {
            let mut out: Vec<&mut Expression> = vec![expr.as_mut()];
            out.extend(list.iter_mut());
            out
        }
        Expression::Between {
            expr, low, high, ..
        } => vec![expr.as_mut(), low.as_mut(), high.as_mut()],
        Expression::Array(items) => items.iter_mut().collect(),
        Expression::JsonAccess { expr, path, .. } => vec![expr.as_mut(), path.as_mut()],
        Expression::Column { .. }
        | Expression::Literal(_)
        | Expression::Subquery(_)
        | Expression::Exists(_)
        | Expression::Wildcard
        | Expression::Parameter(_)
        | Expression::TypedString { .. }
        | Expression::Raw(_) => Vec::new(),
    }
}

/// Pre-order walk over an expression tree.
pub fn walk_expr<'a, F: FnMut(&'a Expression)>(expr: &'a Expression, f: &mut F) {
    f(expr);
    for child in children(expr) {
        walk_expr(child, f);
    }
}

/// Pre-order mutable walk; `f` sees a node before its children.
pub fn walk_expr_mut<F: FnMut(&mut Expression)>(expr: &mut Expression, f: &mut F) {
    f(expr);
    for child in children_mut(expr) {
        walk_expr_mut(child, f);
    }
}

/// Bottom-up rewrite: children are rewritten before their parent is handed to `f`.
pub fn transform_expr<F: FnMut(Expression) -> Expression>(expr: &mut Expression, f: &mut F) {
    for child in children_mut(expr) {
        transform_expr(child, f);
    }
    let taken = std::mem::replace(expr, Expression::Wildcard);
    *expr = f(taken);
}

/// Every expression owned directly by a SELECT block.
pub fn select_exprs(select: &SelectQuery) -> Vec<&Expression> {
    let mut out = Vec::new();
    for item in &select.projections {
        if let SelectItem::Expression { expr, .. } = item {
            out.push(expr);
        }
    }
    for join in &select.joins {
        if let Some(JoinCondition::On(cond)) = &join.condition {
            out.push(cond);
        }
    }
    out.extend(select.filter.iter());
    out.extend(select.group_by.iter());
    out.extend(select.having.iter());
    out.extend(select.order_by.iter().map(|o| &o.expr));
    out
}

pub fn select_exprs_mut(select: &mut SelectQuery) -> Vec<&mut Expression> {
    let mut out = Vec::new();
    for item in select.projections.iter_mut() {
        if let SelectItem::Expression { expr, .. } = item {
            out.push(expr);
        }
    }
    for join in select.joins.iter_mut() {
        if let Some(JoinCondition::On(cond)) = &mut join.condition {
            out.push(cond);
        }
    }
    out.extend(select.filter.iter_mut());
    out.extend(select.group_by.iter_mut());
    out.extend(select.having.iter_mut());
    out.extend(select.order_by.iter_mut().map(|o| &mut o.expr));
    out
}

/// Queries nested directly inside an expression tree.
pub fn expr_subqueries(expr: &Expression) -> Vec<&Query> {
    let mut out = Vec::new();
    collect_subqueries(expr, &mut out);
    out
}

fn collect_subqueries<'a>(expr: &'a Expression, out: &mut Vec<&'a Query>) {
    match expr {
        Expression::Subquery(q) | Expression::Exists(q) => out.push(q.as_ref()),
        Expression::InSubquery { subquery, .. } => out.push(subquery.as_ref()),
        _ => {}
    }
    for child in children(expr) {
        collect_subqueries(child, out);
    }
}

fn table_ref_query_mut(table: &mut TableRef) -> Option<&mut Query> {
    match table {
        TableRef::Subquery { query, .. } => Some(query.as_mut()),
        _ => None,
    }
}

/// Visit every SELECT block of `query`, innermost first.
pub fn for_each_select_mut(query: &mut Query, f: &mut dyn FnMut(&mut SelectQuery)) {
    match query {
        Query::Select(select) => {
            for table in select.from.iter_mut() {
                if let Some(q) = table_ref_query_mut(table) {
                    for_each_select_mut(q, f);
                }
            }
            for join in select.joins.iter_mut() {
                if let Some(q) = table_ref_query_mut(&mut join.table) {
                    for_each_select_mut(q, f);
                }
            }
            for expr in select_exprs_mut(select) {
                for_each_expr_query_mut(expr, f);
            }
            if let Some(set_op) = select.set_op.as_mut() {
                for_each_select_mut(&mut set_op.right, f);
            }
            f(&mut **select);
        }
        Query::With(cte) => {
            for item in cte.ctes.iter_mut() {
                for_each_select_mut(&mut item.query, f);
            }
            for_each_select_mut(&mut cte.body, f);
        }
        Query::Insert(insert) => {
            if let InsertSource::Query(q) = &mut insert.source {
                for_each_select_mut(q, f);
            }
        }
        Query::Update(update) => {
            if let Some(filter) = update.filter.as_mut() {
                for_each_expr_query_mut(filter, f);
            }
        }
        Query::Delete(delete) => {
            if let Some(filter) = delete.filter.as_mut() {
                for_each_expr_query_mut(filter, f);
            }
        }
        Query::Raw(_) => {}
    }
}

fn for_each_expr_query_mut(expr: &mut Expression, f: &mut dyn FnMut(&mut SelectQuery)) {
    walk_expr_mut(expr, &mut |e| match e {
        Expression::Subquery(q) | Expression::Exists(q) => for_each_select_mut(q, f),
        Expression::InSubquery { subquery, .. } => for_each_select_mut(subquery, f),
        _ => {}
    });
}

/// Like [`for_each_select_mut`], but a SELECT is handed to `f` before the
/// queries nested inside it, so rewrites of an outer block reach inner ones.
pub fn for_each_select_mut_pre(query: &mut Query, f: &mut dyn FnMut(&mut SelectQuery)) {
    match query {
        Query::Select(select) => {
            f(&mut **select);
            for table in select.from.iter_mut() {
                if let Some(q) = table_ref_query_mut(table) {
                    for_each_select_mut_pre(q, f);
                }
            }
            for join in select.joins.iter_mut() {
                if let Some(q) = table_ref_query_mut(&mut join.table) {
                    for_each_select_mut_pre(q, f);
                }
            }
            for expr in select_exprs_mut(select) {
                walk_expr_mut(expr, &mut |e| match e {
                    Expression::Subquery(q) | Expression::Exists(q) => {
                        for_each_select_mut_pre(q, f)
                    }
                    Expression::InSubquery { subquery, .. } => for_each_select_mut_pre(subquery, f),
                    _ => {}
                });
            }
            if let Some(set_op) = select.set_op.as_mut() {
                for_each_select_mut_pre(&mut set_op.right, f);
            }
        }
        Query::With(cte) => {
            for item in cte.ctes.iter_mut() {
                for_each_select_mut_pre(&mut item.query, f);
            }
            for_each_select_mut_pre(&mut cte.body, f);
        }
        Query::Insert(insert) => {
            if let InsertSource::Query(q) = &mut insert.source {
                for_each_select_mut_pre(q, f);
            }
        }
        // Statement-level filters only nest queries through subqueries, and
        // those are reached by the bottom-up walker as well.
        other => for_each_select_mut(other, f),
    }
}

/// Lowercased names of every CTE defined anywhere in `query`.
pub fn cte_names(query: &Query) -> Vec<String> {
    let mut out = Vec::new();
    collect_cte_names(query, &mut out);
    out
}

fn collect_cte_names(query: &Query, out: &mut Vec<String>) {
    match query {
        Query::With(cte) => {
            for item in &cte.ctes {
                out.push(item.name.to_lowercase());
                collect_cte_names(&item.query, out);
            }
            collect_cte_names(&cte.body, out);
        }
        Query::Select(select) => {
            for table in select.from.iter().chain(select.joins.iter().map(|j| &j.table)) {
                if let TableRef::Subquery { query, .. } = table {
                    collect_cte_names(query, out);
                }
            }
            for expr in select_exprs(select) {
                for q in expr_subqueries(expr) {
                    collect_cte_names(q, out);
                }
            }
            if let Some(set_op) = select.set_op.as_deref() {
                collect_cte_names(&set_op.right, out);
            }
        }
        Query::Insert(insert) => {
            if let InsertSource::Query(q) = &insert.source {
                collect_cte_names(q, out);
            }
        }
        Query::Update(_) | Query::Delete(_) | Query::Raw(_) => {}
    }
}

/// Read-only counterpart of [`for_each_select_mut`], outermost first.
pub fn for_each_select<'a>(query: &'a Query, f: &mut dyn FnMut(&'a SelectQuery)) {
    match query {
        Query::Select(select) => {
            f(&**select);
            for table in select.from.iter().chain(select.joins.iter().map(|j| &j.table)) {
                if let TableRef::Subquery { query, .. } = table {
                    for_each_select(query, f);
                }
            }
            for expr in select_exprs(select) {
                for q in expr_subqueries(expr) {
                    for_each_select(q, f);
                }
            }
            if let Some(set_op) = select.set_op.as_deref() {
                for_each_select(&set_op.right, f);
            }
        }
        Query::With(cte) => {
            for item in &cte.ctes {
                for_each_select(&item.query, f);
            }
            for_each_select(&cte.body, f);
        }
        Query::Insert(insert) => {
            if let InsertSource::Query(q) = &insert.source {
                for_each_select(q, f);
            }
        }
        Query::Update(update) => {
            for q in update.filter.iter().flat_map(expr_subqueries) {
                for_each_select(q, f);
            }
        }
        Query::Delete(delete) => {
            for q in delete.filter.iter().flat_map(expr_subqueries) {
                for_each_select(q, f);
            }
        }
        Query::Raw(_) => {}
    }
}

/// Split a predicate on top-level AND into its conjuncts.
pub fn conjuncts(expr: &Expression) -> Vec<&Expression> {
    match expr {
        Expression::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let mut out = conjuncts(left);
            out.extend(conjuncts(right));
            out
        }
        Expression::Nested(inner)
            if matches!(
                inner.as_ref(),
                Expression::BinaryOp {
                    op: BinaryOperator::And,
                    ..
                }
            ) =>
        {
            conjuncts(inner)
        }
        other => vec![other],
    }
}

/// Rebuild a left-deep AND chain from conjuncts; `None` when empty.
pub fn and_all(mut parts: Vec<Expression>) -> Option<Expression> {
    if parts.is_empty() {
        return None;
    }
    let first = parts.remove(0);
    Some(
        parts
            .into_iter()
            .fold(first, |acc, next| Expression::binary(acc, BinaryOperator::And, next)),
    )
}

/// Column references in an expression, not descending into subqueries.
pub fn column_refs(expr: &Expression) -> Vec<(Option<&str>, &str)> {
    let mut out = Vec::new();
    walk_expr(expr, &mut |e| {
        if let Expression::Column { table, name } = e {
            out.push((table.as_deref(), name.as_str()));
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Expression {
        Expression::column(None, name)
    }

    fn int(v: i64) -> Expression {
        Expression::Literal(Literal::Integer(v))
    }

    #[test]
    fn test_conjuncts_flatten_nested_and() {
        let expr = Expression::binary(
            Expression::Nested(Box::new(Expression::binary(
                Expression::binary(col("a"), BinaryOperator::Eq, int(1)),
                BinaryOperator::And,
                Expression::binary(col("b"), BinaryOperator::Eq, int(2)),
            ))),
            BinaryOperator::And,
            Expression::binary(col("c"), BinaryOperator::Eq, int(3)),
        );
        assert_eq!(conjuncts(&expr).len(), 3);
    }

    #[test]
    fn test_conjuncts_keep_or() {
        let expr = Expression::binary(col("a"), BinaryOperator::Or, col("b"));
        assert_eq!(conjuncts(&expr).len(), 1);
    }

    #[test]
    fn test_and_all() {
        assert!(and_all(vec![]).is_none());
        let rebuilt = and_all(vec![col("a"), col("b"), col("c")]).unwrap();
        assert_eq!(conjuncts(&rebuilt).len(), 3);
    }

    #[test]
    fn test_transform_bottom_up() {
        let mut expr = Expression::binary(int(1), BinaryOperator::Plus, int(2));
        let mut seen = Vec::new();
        transform_expr(&mut expr, &mut |e| {
            seen.push(matches!(e, Expression::BinaryOp { .. }));
            e
        });
        assert_eq!(seen, vec![false, false, true]);
    }

    #[test]
    fn test_for_each_select_reaches_subqueries() {
        let inner = Query::Select(Box::new(SelectQuery {
            projections: vec![SelectItem::Expression {
                expr: col("id"),
                alias: None,
            }],
            ..Default::default()
        }));
        let mut outer = Query::Select(Box::new(SelectQuery {
            projections: vec![SelectItem::Wildcard],
            filter: Some(Expression::InSubquery {
                expr: Box::new(col("id")),
                subquery: Box::new(inner),
                negated: false,
            }),
            ..Default::default()
        }));

        let mut count = 0;
        for_each_select(&outer, &mut |_| count += 1);
        assert_eq!(count, 2);

        let mut order = Vec::new();
        for_each_select_mut(&mut outer, &mut |s| order.push(s.filter.is_some()));
        assert_eq!(order, vec![false, true]);
    }

    #[test]
    fn test_pre_order_visits_outer_first() {
        let inner = Query::Select(Box::new(SelectQuery {
            projections: vec![SelectItem::Wildcard],
            ..Default::default()
        }));
        let mut outer = Query::Select(Box::new(SelectQuery {
            from: vec![TableRef::Subquery {
                query: Box::new(inner),
                alias: "s".into(),
            }],
            ..Default::default()
        }));
        let mut order = Vec::new();
        for_each_select_mut_pre(&mut outer, &mut |s| order.push(s.from.len()));
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_cte_names() {
        let q = Query::With(CTEQuery {
            recursive: false,
            ctes: vec![CTE {
                name: "Recent".into(),
                columns: vec![],
                query: Query::Select(Box::new(SelectQuery::default())),
            }],
            body: Box::new(Query::Select(Box::new(SelectQuery::default()))),
        });
        assert_eq!(cte_names(&q), vec!["recent".to_string()]);
    }

    #[test]
    fn test_column_refs_skip_subqueries() {
        let expr = Expression::binary(
            Expression::column(Some("u"), "id"),
            BinaryOperator::Eq,
            Expression::Subquery(Box::new(Query::Select(Box::new(SelectQuery {
                filter: Some(col("hidden")),
                ..Default::default()
            })))),
        );
        assert_eq!(column_refs(&expr), vec![(Some("u"), "id")]);
    }
}
