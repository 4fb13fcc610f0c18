//! Structural metadata extraction.
//!
//! A single left-to-right walk over a statement in clause order collects
//! tables, columns, joins, functions, subqueries and the filter, grouping
//! and ordering clauses. Every list therefore follows source order.
use serde::Serialize;

use super::compiler::{GenerateOptions, Generator};
use super::types::*;
use super::visit::{children, conjuncts};
use crate::dialect::Dialect;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub table: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasInfo {
    pub alias: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinInfo {
    #[serde(rename = "type")]
    pub join_type: String,
    pub table: String,
    pub on_condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubqueryInfo {
    pub alias: Option<String>,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderInfo {
    pub expression: String,
    pub desc: bool,
}

/// Everything `extract_metadata` reports about one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetadata {
    pub query_type: String,
    pub tables: Vec<TableInfo>,
    pub columns: Vec<ColumnInfo>,
    pub aliases: Vec<AliasInfo>,
    pub functions: Vec<FunctionInfo>,
    pub joins: Vec<JoinInfo>,
    pub subqueries: Vec<SubqueryInfo>,
    pub where_conditions: Vec<String>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderInfo>,
}

impl QueryMetadata {
    /// Short human-readable digest of the counts.
    pub fn summary(&self) -> String {
        let parts = [
            format!("Query Type: {}", self.query_type),
            format!("Tables: {}", self.tables.len()),
            format!("Columns: {}", self.columns.len()),
            format!("Joins: {}", self.joins.len()),
            format!("Functions: {}", self.functions.len()),
        ];
        format!("SQL Analysis:\n- {}", parts.join("\n- "))
    }
}

/// Extract metadata from a parsed statement. Texts are rendered in `dialect`.
pub fn extract_metadata(query: &Query, dialect: Option<Dialect>) -> QueryMetadata {
    let mut collector = Collector {
        gen: Generator::new(GenerateOptions::for_dialect(dialect)),
        meta: QueryMetadata {
            query_type: query.kind().to_string(),
            tables: Vec::new(),
            columns: Vec::new(),
            aliases: Vec::new(),
            functions: Vec::new(),
            joins: Vec::new(),
            subqueries: Vec::new(),
            where_conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
        },
    };
    collector.query(query);
    collector.meta
}

struct Collector {
    gen: Generator,
    meta: QueryMetadata,
}

impl Collector {
    fn query(&mut self, query: &Query) {
        match query {
            Query::Select(select) => self.select(select),
            Query::With(cte) => {
                for item in &cte.ctes {
                    self.query(&item.query);
                }
                self.query(&cte.body);
            }
            Query::Insert(insert) => {
                self.table_ref(&insert.table);
                for column in &insert.columns {
                    self.column(None, column);
                }
                match &insert.source {
                    InsertSource::Values(rows) => {
                        for expr in rows.iter().flatten() {
                            self.expr(expr);
                        }
                    }
                    InsertSource::Query(q) => self.query(q),
                }
                self.projections(&insert.returning);
            }
            Query::Update(update) => {
                self.table_ref(&update.table);
                for assignment in &update.assignments {
                    self.column(None, &assignment.column);
                    self.expr(&assignment.value);
                }
                self.filter(update.filter.as_ref());
                self.projections(&update.returning);
            }
            Query::Delete(delete) => {
                self.table_ref(&delete.table);
                self.filter(delete.filter.as_ref());
                self.projections(&delete.returning);
            }
            Query::Raw(_) => {}
        }
    }

    fn select(&mut self, select: &SelectQuery) {
        self.projections(&select.projections);
        for table in &select.from {
            self.table_ref(table);
        }
        for join in &select.joins {
            self.join(join);
        }
        self.filter(select.filter.as_ref());
        for expr in &select.group_by {
            self.meta.group_by.push(self.gen.expr(expr));
            self.expr(expr);
        }
        if let Some(having) = &select.having {
            self.expr(having);
        }
        for order in &select.order_by {
            self.meta.order_by.push(OrderInfo {
                expression: self.gen.expr(&order.expr),
                desc: order.asc == Some(false),
            });
            self.expr(&order.expr);
        }
        if let Some(set_op) = &select.set_op {
            self.query(&set_op.right);
        }
    }

    fn projections(&mut self, items: &[SelectItem]) {
        for item in items {
            if let SelectItem::Expression { expr, alias } = item {
                if let Some(alias) = alias {
                    self.meta.aliases.push(AliasInfo {
                        alias: alias.clone(),
                        expression: self.gen.expr(expr),
                    });
                }
                self.expr(expr);
            }
        }
    }

    fn filter(&mut self, filter: Option<&Expression>) {
        if let Some(filter) = filter {
            for part in conjuncts(filter) {
                self.meta.where_conditions.push(self.gen.expr(part));
            }
            self.expr(filter);
        }
    }

    fn table_ref(&mut self, table: &TableRef) {
        match table {
            TableRef::Table {
                schema,
                name,
                alias,
            } => {
                let info = TableInfo {
                    name: name.clone(),
                    alias: alias.clone(),
                    db: schema.clone(),
                };
                if !self.meta.tables.contains(&info) {
                    self.meta.tables.push(info);
                }
            }
            TableRef::Subquery { query, alias } => {
                self.meta.subqueries.push(SubqueryInfo {
                    alias: Some(alias.clone()),
                    sql: self.gen.query(query),
                });
                self.query(query);
            }
            TableRef::Function { args, .. } => {
                for arg in args {
                    self.expr(arg);
                }
            }
            TableRef::Raw(_) => {}
        }
    }

    fn join(&mut self, join: &Join) {
        let table = match &join.table {
            TableRef::Table { name, .. } => name.clone(),
            TableRef::Subquery { alias, .. } => alias.clone(),
            TableRef::Function { name, .. } => name.clone(),
            TableRef::Raw(text) => text.clone(),
        };
        let on_condition = match &join.condition {
            Some(JoinCondition::On(cond)) => Some(self.gen.expr(cond)),
            _ => None,
        };
        let join_type = match join.join_type {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Cross => "CROSS",
            JoinType::Lateral => "LATERAL",
        };
        self.meta.joins.push(JoinInfo {
            join_type: join_type.to_string(),
            table,
            on_condition,
        });

        self.table_ref(&join.table);
        match &join.condition {
            Some(JoinCondition::On(cond)) => self.expr(cond),
            Some(JoinCondition::Using(columns)) => {
                for column in columns {
                    self.column(None, column);
                }
            }
            _ => {}
        }
    }

    fn column(&mut self, table: Option<&str>, name: &str) {
        let info = ColumnInfo {
            name: name.to_string(),
            table: table.map(str::to_string),
        };
        if !self.meta.columns.contains(&info) {
            self.meta.columns.push(info);
        }
    }

    fn function(&mut self, name: &str, expr: &Expression) {
        if !self.meta.functions.iter().any(|f| f.name == name) {
            self.meta.functions.push(FunctionInfo {
                name: name.to_string(),
                sql: self.gen.expr(expr),
            });
        }
    }

    fn subquery(&mut self, query: &Query) {
        self.meta.subqueries.push(SubqueryInfo {
            alias: None,
            sql: self.gen.query(query),
        });
        self.query(query);
    }

    /// Pre-order walk so outer nodes are recorded before their operands.
    /// The left operand of `IN (subquery)` comes before the subquery.
    fn expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Column { table, name } => self.column(table.as_deref(), name),
            Expression::Function { name, .. } | Expression::Aggregate { name, .. } => {
                self.function(name, expr)
            }
            Expression::Subquery(q) | Expression::Exists(q) => self.subquery(q),
            Expression::InSubquery {
                expr: operand,
                subquery,
                ..
            } => {
                self.expr(operand);
                self.subquery(subquery);
                return;
            }
            _ => {}
        }
        for child in children(expr) {
            self.expr(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::parse_single;

    fn extract(sql: &str) -> QueryMetadata {
        extract_metadata(&parse_single(sql, None).unwrap(), None)
    }

    #[test]
    fn test_aliased_table() {
        let meta = extract("SELECT a.x FROM t a");
        assert_eq!(meta.query_type, "Select");
        assert_eq!(
            meta.tables,
            vec![TableInfo {
                name: "t".into(),
                alias: Some("a".into()),
                db: None
            }]
        );
        assert_eq!(
            meta.columns,
            vec![ColumnInfo {
                name: "x".into(),
                table: Some("a".into())
            }]
        );
        assert!(meta.joins.is_empty());
        assert!(meta.where_conditions.is_empty());
        assert!(meta.group_by.is_empty());
        assert!(meta.order_by.is_empty());
    }

    #[test]
    fn test_joins_and_conditions() {
        let meta = extract(
            "SELECT u.name, COUNT(o.id) AS orders FROM users u \
             LEFT JOIN orders o ON u.id = o.user_id \
             WHERE u.active = TRUE AND o.total > 10 \
             GROUP BY u.name ORDER BY orders DESC",
        );
        assert_eq!(meta.joins.len(), 1);
        assert_eq!(meta.joins[0].join_type, "LEFT");
        assert_eq!(meta.joins[0].table, "orders");
        assert_eq!(meta.joins[0].on_condition.as_deref(), Some("u.id = o.user_id"));
        assert_eq!(
            meta.where_conditions,
            vec!["u.active = TRUE".to_string(), "o.total > 10".to_string()]
        );
        assert_eq!(meta.group_by, vec!["u.name".to_string()]);
        assert_eq!(
            meta.order_by,
            vec![OrderInfo {
                expression: "orders".into(),
                desc: true
            }]
        );
        assert_eq!(meta.functions[0].name, "COUNT");
        assert_eq!(meta.functions[0].sql, "COUNT(o.id)");
        assert_eq!(meta.aliases[0].alias, "orders");
        let names: Vec<&str> = meta.columns.iter().map(|c| c.name.as_str()).collect();
        // Qualified references stay distinct per qualifier.
        assert_eq!(
            names,
            vec!["name", "id", "id", "user_id", "active", "total", "orders"]
        );
    }

    #[test]
    fn test_subqueries() {
        let meta = extract(
            "SELECT * FROM (SELECT id FROM a) AS s WHERE s.id IN (SELECT id FROM b)",
        );
        assert_eq!(meta.subqueries.len(), 2);
        assert_eq!(meta.subqueries[0].alias.as_deref(), Some("s"));
        assert_eq!(meta.subqueries[0].sql, "SELECT id FROM a");
        assert_eq!(meta.subqueries[1].alias, None);
        let tables: Vec<&str> = meta.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["a", "b"]);
    }

    #[test]
    fn test_in_subquery_operand_comes_first() {
        let meta = extract("SELECT * FROM a WHERE x IN (SELECT y FROM b WHERE z = 1)");
        let columns: Vec<&str> = meta.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["x", "y", "z"]);
        let tables: Vec<&str> = meta.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, vec!["a", "b"]);
        assert_eq!(meta.subqueries.len(), 1);
    }

    #[test]
    fn test_schema_qualified_table() {
        let meta = extract("SELECT * FROM sales.orders");
        assert_eq!(meta.tables[0].db.as_deref(), Some("sales"));
    }

    #[test]
    fn test_dml_and_set_operations() {
        assert_eq!(extract("UPDATE t SET a = 1 WHERE b = 2").query_type, "Update");
        assert_eq!(extract("SELECT 1 UNION SELECT 2").query_type, "Union");
        let meta = extract("DELETE FROM t WHERE id = 3");
        assert_eq!(meta.query_type, "Delete");
        assert_eq!(meta.where_conditions, vec!["id = 3".to_string()]);
    }

    #[test]
    fn test_summary() {
        let meta = extract("SELECT a.x FROM t a");
        assert_eq!(
            meta.summary(),
            "SQL Analysis:\n- Query Type: Select\n- Tables: 1\n- Columns: 1\n- Joins: 0\n- Functions: 0"
        );
    }
}
