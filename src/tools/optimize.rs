use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::debug;

use super::{dialect_param, sql_block, sql_param, ParamKind, ParameterSpec, Parameters, Tool, ToolMessage};
use crate::ast::{compile_with, format_with, parse_single, GenerateOptions, Optimizer, Schema};
use crate::dialect::Dialect;
use crate::error::Result;

pub struct OptimizeTool;

/// Result of running the optimizer pipeline over one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimized {
    pub sql: String,
    pub passes: Vec<String>,
}

/// Parse, optimize and render one statement.
pub fn optimize_sql(
    sql: &str,
    dialect: Option<Dialect>,
    schema: Option<Schema>,
    pretty: bool,
) -> Result<Optimized> {
    let query = parse_single(sql, dialect)?;
    let optimizer = Optimizer::with_schema(schema.map(Arc::new));
    let optimized = optimizer.optimize(query)?;
    let opts = GenerateOptions::for_dialect(dialect);
    let sql = if pretty {
        format_with(&optimized, &opts)
    } else {
        compile_with(&optimized, &opts)
    };
    Ok(Optimized {
        sql,
        passes: optimizer.pass_names().into_iter().map(String::from).collect(),
    })
}

impl Tool for OptimizeTool {
    fn name(&self) -> &'static str {
        "optimize"
    }

    fn description(&self) -> &'static str {
        "Rewrite a SQL query into a simpler equivalent: fold constants, simplify \
         predicates, push filters into subqueries and drop unused columns."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            sql_param(),
            dialect_param(),
            ParameterSpec::optional(
                "schema",
                ParamKind::Object,
                "Table schema as JSON, e.g. {\"users\": {\"id\": \"INT\", \"name\": \"TEXT\"}}.",
            ),
            ParameterSpec::optional("pretty", ParamKind::Boolean, "Pretty-print the output.")
                .with_default(json!(true)),
        ]
    }

    fn invoke(&self, params: &Parameters) -> Result<Vec<ToolMessage>> {
        let sql = params.sql()?;
        let dialect = params.dialect("dialect")?;
        let pretty = params.flag("pretty", true)?;
        let schema = params.payload("schema").map(Schema::from_json).transpose()?;
        let schema_provided = schema.as_ref().map_or(false, |s| !s.is_empty());

        let started = Instant::now();
        let optimized = optimize_sql(sql, dialect, schema, pretty)?;
        debug!(
            dialect = Dialect::label(dialect),
            schema = schema_provided,
            passes = optimized.passes.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "optimized sql"
        );

        let response = json!({
            "original_sql": sql,
            "optimized_sql": optimized.sql,
            "dialect": Dialect::label(dialect),
            "schema_provided": schema_provided,
            "optimization_applied": true,
            "passes": optimized.passes,
        });
        Ok(vec![
            ToolMessage::text("Successfully optimized SQL query"),
            sql_block("Optimized SQL", &optimized.sql),
            ToolMessage::json(response),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn run(params: Value) -> Result<Value> {
        let messages = OptimizeTool.invoke(&Parameters::from_json(&params).unwrap())?;
        Ok(messages.iter().find_map(ToolMessage::as_json).cloned().unwrap())
    }

    #[test]
    fn test_tautology_removed() {
        let r = run(json!({
            "sql": "SELECT * FROM users WHERE active = TRUE OR active = FALSE",
            "pretty": false
        }))
        .unwrap();
        assert_eq!(r["optimized_sql"], "SELECT * FROM users");
        assert_eq!(r["schema_provided"], false);
        assert_eq!(r["optimization_applied"], true);
    }

    #[test]
    fn test_deterministic() {
        let params = json!({"sql": "SELECT a + 1 + 2 FROM t WHERE NOT (b > 3) AND 1 = 1"});
        assert_eq!(run(params.clone()).unwrap(), run(params).unwrap());
    }

    #[test]
    fn test_schema_as_string() {
        let r = run(json!({
            "sql": "SELECT * FROM users WHERE active = 1",
            "schema": "{\"users\": {\"id\": \"INT\", \"active\": \"BOOLEAN\"}}",
            "pretty": false
        }))
        .unwrap();
        assert_eq!(r["optimized_sql"], "SELECT id, active FROM users WHERE active");
        assert_eq!(r["schema_provided"], true);
        let passes = r["passes"].as_array().unwrap();
        assert_eq!(passes[0], "validate_schema");
    }

    #[test]
    fn test_schema_errors() {
        let err = run(json!({
            "sql": "SELECT missing FROM users",
            "schema": {"users": {"id": "INT"}}
        }))
        .unwrap_err();
        assert_eq!(err.error_type(), "SchemaError");

        let err = run(json!({"sql": "SELECT 1", "schema": "[1, 2]"})).unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
    }
}
