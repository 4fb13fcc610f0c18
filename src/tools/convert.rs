use serde_json::json;
use tracing::debug;

use super::{sql_block, sql_param, ParamKind, ParameterSpec, Parameters, Tool, ToolMessage};
use crate::ast::{compile_with, format_with, parse_sql, GenerateOptions};
use crate::dialect::Dialect;
use crate::error::{Result, SqlToolError};

/// Dialect conversion: parse under one dialect, render under another.
pub struct ConvertTool;

/// Convert every statement of `sql` from `read` (generic when `None`) to
/// `write`, one rendered string per statement.
pub fn transpile(
    sql: &str,
    read: Option<Dialect>,
    write: Dialect,
    pretty: bool,
) -> Result<Vec<String>> {
    let queries = parse_sql(sql, read)?;
    if queries.is_empty() {
        return Err(SqlToolError::parse("No valid SQL statements found"));
    }
    let opts = GenerateOptions::for_dialect(Some(write));
    Ok(queries
        .iter()
        .map(|q| {
            if pretty {
                format_with(q, &opts)
            } else {
                compile_with(q, &opts)
            }
        })
        .collect())
}

impl Tool for ConvertTool {
    fn name(&self) -> &'static str {
        "convert"
    }

    fn description(&self) -> &'static str {
        "Convert SQL from one dialect to another (for example MySQL to PostgreSQL)."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            sql_param(),
            ParameterSpec::required(
                "target_dialect",
                ParamKind::String,
                "Dialect to convert the SQL into.",
            ),
            ParameterSpec::optional(
                "source_dialect",
                ParamKind::String,
                "Dialect the SQL is written in. Leave empty to auto-detect.",
            ),
            ParameterSpec::optional("pretty", ParamKind::Boolean, "Pretty-print the output.")
                .with_default(json!(true)),
        ]
    }

    fn invoke(&self, params: &Parameters) -> Result<Vec<ToolMessage>> {
        let sql = params.sql()?;
        let target: Dialect = params
            .required_str("target_dialect", "Target dialect is required.")?
            .parse()?;
        let source = params.dialect("source_dialect")?;
        let pretty = params.flag("pretty", true)?;

        let statements = transpile(sql, source, target, pretty)?;
        let transpiled = statements.join(";\n\n");
        debug!(
            source = Dialect::label(source),
            target = target.name(),
            statements = statements.len(),
            "converted sql"
        );

        let response = json!({
            "original_sql": sql,
            "transpiled_sql": transpiled,
            "source_dialect": Dialect::label(source),
            "target_dialect": target.name(),
            "statement_count": statements.len(),
        });
        Ok(vec![
            ToolMessage::text(format!(
                "Successfully transpiled SQL from {} to {}",
                Dialect::label(source),
                target.name()
            )),
            sql_block("Transpiled SQL", &transpiled),
            ToolMessage::json(response),
        ])
    }
}
