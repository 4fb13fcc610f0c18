//! Passes that need caller-supplied table schemas.
use std::sync::Arc;

use super::scope::{column_type, select_sources, table_source, Source};
use super::OptimizationPass;
use crate::ast::schema::{Schema, TypeFamily};
use crate::ast::types::*;
use crate::ast::visit::{
    column_refs, cte_names, expr_subqueries, for_each_select_mut, select_exprs, transform_expr,
};
use crate::error::{Result, SqlToolError};
use crate::temporal::{format_date, format_timestamp, parse_date, parse_timestamp};

/// Rejects column references that cannot resolve against the schema.
pub struct ValidateSchema {
    pub schema: Arc<Schema>,
}

impl OptimizationPass for ValidateSchema {
    fn name(&self) -> &str {
        "validate_schema"
    }

    fn description(&self) -> &str {
        "Checks every column reference against the FROM sources in its scope"
    }

    fn transform(&self, query: Query) -> Result<Query> {
        let ctes = cte_names(&query);
        let validator = Validator {
            schema: &self.schema,
            ctes: &ctes,
        };
        validator.query(&query, &[])?;
        Ok(query)
    }
}

struct Validator<'a> {
    schema: &'a Schema,
    ctes: &'a [String],
}

impl<'a> Validator<'a> {
    fn query(&self, query: &Query, outer: &[Source<'a>]) -> Result<()> {
        match query {
            Query::Select(select) => self.select(select, outer),
            Query::With(cte) => {
                for item in &cte.ctes {
                    self.query(&item.query, outer)?;
                }
                self.query(&cte.body, outer)
            }
            Query::Insert(insert) => match &insert.source {
                InsertSource::Query(q) => self.query(q, outer),
                InsertSource::Values(_) => Ok(()),
            },
            Query::Update(update) => {
                let local = vec![table_source(&update.table, self.schema, self.ctes)];
                let scope = self.scope_with(local, outer);
                for assignment in &update.assignments {
                    self.expr(&assignment.value, &scope, &[])?;
                }
                match &update.filter {
                    Some(filter) => self.expr(filter, &scope, &[]),
                    None => Ok(()),
                }
            }
            Query::Delete(delete) => {
                let local = vec![table_source(&delete.table, self.schema, self.ctes)];
                let scope = self.scope_with(local, outer);
                match &delete.filter {
                    Some(filter) => self.expr(filter, &scope, &[]),
                    None => Ok(()),
                }
            }
            Query::Raw(_) => Ok(()),
        }
    }

    fn scope_with(&self, mut local: Vec<Source<'a>>, outer: &[Source<'a>]) -> Vec<Source<'a>> {
        local.extend(outer.iter().cloned());
        local
    }

    fn select(&self, select: &SelectQuery, outer: &[Source<'a>]) -> Result<()> {
        for table in select.from.iter().chain(select.joins.iter().map(|j| &j.table)) {
            if let TableRef::Subquery { query, .. } = table {
                self.query(query, outer)?;
            }
        }

        let scope = self.scope_with(select_sources(select, self.schema, self.ctes), outer);
        let aliases: Vec<&str> = select
            .projections
            .iter()
            .filter_map(|item| match item {
                SelectItem::Expression {
                    alias: Some(a), ..
                } => Some(a.as_str()),
                _ => None,
            })
            .collect();

        for item in &select.projections {
            if let SelectItem::QualifiedWildcard(q) = item {
                if !scope.iter().any(|s| s.matches(q)) {
                    return Err(SqlToolError::schema(format!(
                        "Unknown table or alias '{}' in '{}.*'",
                        q, q
                    )));
                }
            }
        }
        if let Some(using) = select.joins.iter().find_map(|j| match &j.condition {
            Some(JoinCondition::Using(cols)) => Some(cols),
            _ => None,
        }) {
            for col in using {
                self.column(&scope, None, col, &[])?;
            }
        }
        for expr in select_exprs(select) {
            self.expr(expr, &scope, &aliases)?;
        }

        match select.set_op.as_deref() {
            Some(set_op) => self.query(&set_op.right, outer),
            None => Ok(()),
        }
    }

    fn expr(&self, expr: &Expression, scope: &[Source<'a>], aliases: &[&str]) -> Result<()> {
        for (table, name) in column_refs(expr) {
            self.column(scope, table, name, aliases)?;
        }
        for q in expr_subqueries(expr) {
            self.query(q, scope)?;
        }
        Ok(())
    }

    fn column(
        &self,
        scope: &[Source<'a>],
        table: Option<&str>,
        name: &str,
        aliases: &[&str],
    ) -> Result<()> {
        match table {
            Some(q) => {
                let source = scope.iter().find(|s| s.matches(q)).ok_or_else(|| {
                    SqlToolError::schema(format!(
                        "Unknown table or alias '{}' referenced by column '{}.{}'",
                        q, q, name
                    ))
                })?;
                match source.table {
                    Some(t) if t.column(name).is_none() => Err(SqlToolError::schema(format!(
                        "Column '{}' not found in table '{}'",
                        name, t.name
                    ))),
                    _ => Ok(()),
                }
            }
            None => {
                let resolvable = scope
                    .iter()
                    .any(|s| s.table.map_or(true, |t| t.column(name).is_some()))
                    || aliases.iter().any(|a| a.eq_ignore_ascii_case(name));
                if resolvable {
                    Ok(())
                } else {
                    Err(SqlToolError::schema(format!(
                        "Column '{}' could not be resolved against any table in scope",
                        name
                    )))
                }
            }
        }
    }
}

/// Replaces `*` and `t.*` with explicit column lists from the schema.
pub struct ExpandStars {
    pub schema: Arc<Schema>,
}

impl OptimizationPass for ExpandStars {
    fn name(&self) -> &str {
        "expand_stars"
    }

    fn description(&self) -> &str {
        "Expands star projections when every source is described by the schema"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        let ctes = cte_names(&query);
        let schema = &self.schema;
        for_each_select_mut(&mut query, &mut |select| {
            expand_select(select, schema, &ctes);
        });
        Ok(query)
    }
}

fn expand_select(select: &mut SelectQuery, schema: &Schema, ctes: &[String]) {
    let has_star = select
        .projections
        .iter()
        .any(|p| matches!(p, SelectItem::Wildcard | SelectItem::QualifiedWildcard(_)));
    // Shared USING / NATURAL columns collapse into one output column.
    let merged_columns = select
        .joins
        .iter()
        .any(|j| matches!(j.condition, Some(JoinCondition::Using(_) | JoinCondition::Natural)));
    if !has_star || merged_columns {
        return;
    }

    let sources = select_sources(select, schema, ctes);
    let qualify = sources.len() > 1;
    let column_items = |source: &Source| -> Option<Vec<SelectItem>> {
        let table = source.table?;
        let qualifier = source.qualifier.as_deref();
        Some(
            table
                .columns
                .iter()
                .map(|c| SelectItem::Expression {
                    expr: Expression::column(if qualify { qualifier } else { None }, &c.name),
                    alias: None,
                })
                .collect(),
        )
    };

    let mut expanded = Vec::new();
    for item in &select.projections {
        match item {
            SelectItem::Wildcard => {
                let all: Option<Vec<Vec<SelectItem>>> = sources.iter().map(column_items).collect();
                match all {
                    Some(lists) if !sources.is_empty() => {
                        expanded.extend(lists.into_iter().flatten())
                    }
                    _ => return,
                }
            }
            SelectItem::QualifiedWildcard(q) => {
                match sources.iter().find(|s| s.matches(q)).and_then(column_items) {
                    Some(items) => expanded.extend(items),
                    None => return,
                }
            }
            other => expanded.push(other.clone()),
        }
    }
    select.projections = expanded;
}

/// Rewrites literals compared against typed columns into that column's type.
pub struct CanonicalizeTypes {
    pub schema: Arc<Schema>,
}

impl OptimizationPass for CanonicalizeTypes {
    fn name(&self) -> &str {
        "canonicalize_types"
    }

    fn description(&self) -> &str {
        "Coerces literals compared with DATE, TIMESTAMP, BOOLEAN and numeric columns"
    }

    fn transform(&self, mut query: Query) -> Result<Query> {
        let ctes = cte_names(&query);
        let schema = &self.schema;
        for_each_select_mut(&mut query, &mut |select| {
            let scope = select_sources(select, schema, &ctes);
            let mut rewrite = |expr: &mut Expression| {
                transform_expr(expr, &mut |e| canonicalize_expr(e, &scope));
            };
            for item in select.projections.iter_mut() {
                if let SelectItem::Expression { expr, .. } = item {
                    rewrite(expr);
                }
            }
            for join in select.joins.iter_mut() {
                if let Some(JoinCondition::On(cond)) = &mut join.condition {
                    rewrite(cond);
                }
            }
            if let Some(filter) = select.filter.as_mut() {
                rewrite(filter);
            }
            if let Some(having) = select.having.as_mut() {
                rewrite(having);
            }
        });
        Ok(query)
    }
}

fn family_of(expr: &Expression, scope: &[Source]) -> Option<TypeFamily> {
    match expr.unnested() {
        Expression::Column { table, name } => {
            column_type(scope, table.as_deref(), name).map(TypeFamily::of)
        }
        _ => None,
    }
}

fn canonicalize_expr(expr: Expression, scope: &[Source]) -> Expression {
    match expr {
        Expression::BinaryOp { left, op, right } if op.is_comparison() => {
            let (left, right) = match (family_of(&left, scope), family_of(&right, scope)) {
                (Some(family), None) => (left, Box::new(coerce(*right, family))),
                (None, Some(family)) => (Box::new(coerce(*left, family)), right),
                _ => (left, right),
            };
            Expression::BinaryOp { left, op, right }
        }
        Expression::Between {
            expr,
            low,
            high,
            negated,
        } => match family_of(&expr, scope) {
            Some(family) => Expression::Between {
                expr,
                low: Box::new(coerce(*low, family)),
                high: Box::new(coerce(*high, family)),
                negated,
            },
            None => Expression::Between {
                expr,
                low,
                high,
                negated,
            },
        },
        Expression::InList {
            expr,
            list,
            negated,
        } => match family_of(&expr, scope) {
            Some(family) => Expression::InList {
                expr,
                list: list.into_iter().map(|e| coerce(e, family)).collect(),
                negated,
            },
            None => Expression::InList {
                expr,
                list,
                negated,
            },
        },
        other => other,
    }
}

fn coerce(expr: Expression, family: TypeFamily) -> Expression {
    match (family, expr) {
        (TypeFamily::Date, Expression::Literal(Literal::String(s))) => match parse_date(&s) {
            Some(d) => typed_cast(format_date(d), "DATE"),
            None => Expression::Literal(Literal::String(s)),
        },
        (TypeFamily::Timestamp, Expression::Literal(Literal::String(s))) => {
            match parse_timestamp(&s) {
                Some(ts) => typed_cast(format_timestamp(ts), "TIMESTAMP"),
                None => Expression::Literal(Literal::String(s)),
            }
        }
        (TypeFamily::Boolean, Expression::Literal(Literal::Integer(i))) if i == 0 || i == 1 => {
            Expression::boolean(i == 1)
        }
        (TypeFamily::Numeric, Expression::Literal(Literal::String(s))) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Expression::Literal(Literal::Integer(i))
            } else {
                match trimmed.parse::<f64>() {
                    Ok(f) if f.is_finite() => Expression::Literal(Literal::Float(f)),
                    _ => Expression::Literal(Literal::String(s)),
                }
            }
        }
        (_, other) => other,
    }
}

fn typed_cast(text: String, data_type: &str) -> Expression {
    Expression::Cast {
        expr: Box::new(Expression::Literal(Literal::String(text))),
        data_type: data_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::compiler::compile;
    use crate::ast::parser::parse_single;
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::from_json(&json!({
                "users": {"id": "INT", "name": "VARCHAR", "active": "BOOLEAN", "created": "DATE"},
                "orders": {"id": "INT", "user_id": "INT", "total": "DECIMAL"}
            }))
            .unwrap(),
        )
    }

    fn run(pass: &dyn OptimizationPass, sql: &str) -> Result<String> {
        let query = parse_single(sql, None).unwrap();
        pass.transform(query).map(|q| compile(&q))
    }

    #[test]
    fn test_validate_accepts_known_columns() {
        let pass = ValidateSchema { schema: schema() };
        let joined = "SELECT u.id, total FROM users AS u JOIN orders AS o ON u.id = o.user_id";
        assert!(run(&pass, joined).is_ok());
        assert!(run(&pass, "SELECT id AS k FROM users ORDER BY k").is_ok());
        assert!(run(&pass, "SELECT x FROM unknown_table").is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_column() {
        let pass = ValidateSchema { schema: schema() };
        let err = run(&pass, "SELECT email FROM users").unwrap_err();
        assert_eq!(err.error_type(), "SchemaError");
        let err = run(&pass, "SELECT u.email FROM users AS u").unwrap_err();
        assert_eq!(err.to_string(), "Column 'email' not found in table 'users'");
    }

    #[test]
    fn test_validate_rejects_unknown_qualifier() {
        let pass = ValidateSchema { schema: schema() };
        let err = run(&pass, "SELECT x.id FROM users").unwrap_err();
        assert!(err.to_string().contains("Unknown table or alias 'x'"));
    }

    #[test]
    fn test_validate_correlated_subquery() {
        let pass = ValidateSchema { schema: schema() };
        let sql = "SELECT name FROM users AS u WHERE EXISTS (SELECT 1 FROM orders AS o WHERE o.user_id = u.id)";
        assert!(run(&pass, sql).is_ok());
    }

    #[test]
    fn test_expand_stars() {
        let pass = ExpandStars { schema: schema() };
        assert_eq!(
            run(&pass, "SELECT * FROM orders").unwrap(),
            "SELECT id, user_id, total FROM orders"
        );
        assert_eq!(
            run(&pass, "SELECT o.* FROM orders AS o JOIN users AS u ON o.user_id = u.id").unwrap(),
            "SELECT o.id, o.user_id, o.total FROM orders AS o JOIN users AS u ON o.user_id = u.id"
        );
    }

    #[test]
    fn test_expand_stars_skips_undescribed() {
        let pass = ExpandStars { schema: schema() };
        assert_eq!(
            run(&pass, "SELECT * FROM orders, misc").unwrap(),
            "SELECT * FROM orders, misc"
        );
    }

    #[test]
    fn test_canonicalize_types() {
        let pass = CanonicalizeTypes { schema: schema() };
        assert_eq!(
            run(&pass, "SELECT id FROM users WHERE created > '2020-01-01' AND active = 1").unwrap(),
            "SELECT id FROM users WHERE created > CAST('2020-01-01' AS DATE) AND active = TRUE"
        );
        assert_eq!(
            run(&pass, "SELECT id FROM orders WHERE total >= '10.5' AND id IN ('1', '2')").unwrap(),
            "SELECT id FROM orders WHERE total >= 10.5 AND id IN (1, 2)"
        );
    }
}
