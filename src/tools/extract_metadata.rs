use tracing::debug;

use super::{dialect_param, sql_param, ParameterSpec, Parameters, Tool, ToolMessage};
use crate::ast::{extract_metadata, parse_single};
use crate::dialect::Dialect;
use crate::error::{Result, SqlToolError};

/// Reports the tables, columns, joins and clauses of one statement.
pub struct ExtractMetadataTool;

impl Tool for ExtractMetadataTool {
    fn name(&self) -> &'static str {
        "extract_metadata"
    }

    fn description(&self) -> &'static str {
        "Extract tables, columns, joins, functions, filters and ordering from a SQL statement."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![sql_param(), dialect_param()]
    }

    fn invoke(&self, params: &Parameters) -> Result<Vec<ToolMessage>> {
        let sql = params.sql()?;
        let dialect = params.dialect("dialect")?;
        let query = parse_single(sql, dialect)?;

        let metadata = extract_metadata(&query, dialect);
        debug!(
            query_type = %metadata.query_type,
            tables = metadata.tables.len(),
            columns = metadata.columns.len(),
            "extracted metadata"
        );

        let mut response = serde_json::to_value(&metadata).map_err(|e| {
            SqlToolError::validation(format!("Failed to serialize metadata: {}", e))
        })?;
        if let Some(obj) = response.as_object_mut() {
            obj.insert("dialect".into(), Dialect::label(dialect).into());
            obj.insert("original_sql".into(), sql.into());
        }
        Ok(vec![
            ToolMessage::text(metadata.summary()),
            ToolMessage::json(response),
        ])
    }
}
