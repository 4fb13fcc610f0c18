use std::time::Instant;

use serde_json::json;
use tracing::debug;

use super::{dialect_param, sql_param, ParamKind, ParameterSpec, Parameters, Tool, ToolMessage};
use crate::ast::parse_single;
use crate::dialect::Dialect;
use crate::engine::{execute, Table, TableSet};
use crate::error::{Result, SqlToolError};
use crate::export::{to_json, to_markdown};

/// Runs a SELECT query against tables supplied as JSON.
pub struct ExecuteOnJsonTool;

/// Parse `sql` and execute it over `tables`.
pub fn execute_sql(sql: &str, tables: &TableSet, dialect: Option<Dialect>) -> Result<Table> {
    let query = parse_single(sql, dialect)?;
    execute(&query, tables)
}

impl Tool for ExecuteOnJsonTool {
    fn name(&self) -> &'static str {
        "execute_on_json"
    }

    fn description(&self) -> &'static str {
        "Execute a SELECT query against in-memory tables given as JSON arrays of row objects."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            sql_param(),
            ParameterSpec::required(
                "tables",
                ParamKind::Object,
                "Tables as JSON, e.g. {\"users\": [{\"id\": 1, \"name\": \"Alice\"}]}.",
            ),
            dialect_param(),
        ]
    }

    fn invoke(&self, params: &Parameters) -> Result<Vec<ToolMessage>> {
        let sql = params.sql()?;
        let dialect = params.dialect("dialect")?;
        let tables = params
            .payload("tables")
            .ok_or_else(|| SqlToolError::validation("Data tables are required."))?;
        let tables = TableSet::from_json(tables)?;

        let started = Instant::now();
        let result = execute_sql(sql, &tables, dialect)?;
        debug!(
            dialect = Dialect::label(dialect),
            tables = tables.len(),
            rows = result.row_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "executed query"
        );

        let mut messages = vec![ToolMessage::text(format!(
            "Query executed successfully. Returned {} row(s).",
            result.row_count()
        ))];
        if result.row_count() > 0 && !result.columns.is_empty() {
            messages.push(ToolMessage::text(format!(
                "\n**Results:**\n{}",
                to_markdown(&result)
            )));
        }
        messages.push(ToolMessage::json(json!({
            "success": true,
            "row_count": result.row_count(),
            "columns": result.columns,
            "data": to_json(&result),
            "original_sql": sql,
            "dialect": Dialect::label(dialect),
        })));
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn run(params: Value) -> Result<Vec<ToolMessage>> {
        ExecuteOnJsonTool.invoke(&Parameters::from_json(&params).unwrap())
    }

    fn response(messages: &[ToolMessage]) -> Value {
        messages.iter().find_map(ToolMessage::as_json).cloned().unwrap()
    }

    #[test]
    fn test_filter_rows() {
        let messages = run(json!({
            "sql": "SELECT * FROM users WHERE age > 25",
            "tables": {"users": [
                {"id": 1, "name": "Alice", "age": 30},
                {"id": 2, "name": "Bob", "age": 22}
            ]}
        }))
        .unwrap();
        let r = response(&messages);
        assert_eq!(r["row_count"], 1);
        assert_eq!(r["columns"], json!(["id", "name", "age"]));
        assert_eq!(r["data"], json!([{"id": 1, "name": "Alice", "age": 30}]));
        assert_eq!(
            messages[0],
            ToolMessage::text("Query executed successfully. Returned 1 row(s).")
        );
        assert!(matches!(&messages[1], ToolMessage::Text { text } if text.contains("| Alice |")));
    }

    #[test]
    fn test_aggregate_filter_with_auto_detected_dialect() {
        for dialect in ["", "postgres", "trino"] {
            let messages = run(json!({
                "sql": "SELECT COUNT(*) FILTER (WHERE v > 1) AS n FROM a",
                "tables": {"a": [{"v": 1}, {"v": 2}]},
                "dialect": dialect
            }))
            .unwrap();
            assert_eq!(response(&messages)["data"], json!([{"n": 1}]), "for {:?}", dialect);
        }
    }

    #[test]
    fn test_tables_as_string_and_empty_result() {
        let messages = run(json!({
            "sql": "SELECT id FROM t WHERE id > 5",
            "tables": "{\"t\": [{\"id\": 1}]}"
        }))
        .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(response(&messages)["data"], json!([]));
    }

    #[test]
    fn test_missing_tables() {
        let err = run(json!({"sql": "SELECT 1"})).unwrap_err();
        assert_eq!(err.to_string(), "Data tables are required.");
        let err = run(json!({"sql": "SELECT * FROM nope", "tables": {}})).unwrap_err();
        assert_eq!(err.error_type(), "ExecutionError");
    }

    #[test]
    fn test_nulls_serialize_as_json_null() {
        let messages = run(json!({
            "sql": "SELECT b FROM t",
            "tables": {"t": [{"a": 1}, {"b": 2}]}
        }))
        .unwrap();
        assert_eq!(response(&messages)["data"], json!([{"b": null}, {"b": 2}]));
    }
}
