use serde_json::json;
use tracing::debug;

use super::{dialect_param, sql_block, sql_param, ParamKind, ParameterSpec, Parameters, Tool, ToolMessage};
use crate::ast::{format_with, parse_sql, GenerateOptions};
use crate::dialect::Dialect;
use crate::error::{Result, SqlToolError};

pub struct BeautifyTool;

/// Pretty-print every statement of `sql`, joined by `";\n\n"`.
pub fn beautify(sql: &str, dialect: Option<Dialect>, identify: bool, normalize: bool) -> Result<Vec<String>> {
    let queries = parse_sql(sql, dialect)?;
    if queries.is_empty() {
        return Err(SqlToolError::parse("No valid SQL statements found"));
    }
    let opts = GenerateOptions {
        dialect,
        identify,
        normalize,
    };
    Ok(queries.iter().map(|q| format_with(q, &opts)).collect())
}

impl Tool for BeautifyTool {
    fn name(&self) -> &'static str {
        "beautify"
    }

    fn description(&self) -> &'static str {
        "Format SQL with consistent indentation, keyword case and line breaks."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            sql_param(),
            dialect_param(),
            ParameterSpec::optional("identify", ParamKind::Boolean, "Quote every identifier.")
                .with_default(json!(false)),
            ParameterSpec::optional("normalize", ParamKind::Boolean, "Lowercase identifiers.")
                .with_default(json!(false)),
        ]
    }

    fn invoke(&self, params: &Parameters) -> Result<Vec<ToolMessage>> {
        let sql = params.sql()?;
        let dialect = params.dialect("dialect")?;
        let identify = params.flag("identify", false)?;
        let normalize = params.flag("normalize", false)?;

        let statements = beautify(sql, dialect, identify, normalize)?;
        let formatted = statements.join(";\n\n");
        debug!(dialect = Dialect::label(dialect), statements = statements.len(), "formatted sql");

        let response = json!({
            "original_sql": sql,
            "formatted_sql": formatted,
            "dialect": Dialect::label(dialect),
            "options": {
                "identify": identify,
                "normalize": normalize,
            },
            "statement_count": statements.len(),
        });
        Ok(vec![
            ToolMessage::text(format!(
                "Successfully formatted {} SQL statement(s)",
                statements.len()
            )),
            sql_block("Formatted SQL", &formatted),
            ToolMessage::json(response),
        ])
    }
}
