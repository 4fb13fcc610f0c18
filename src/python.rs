//! Optional Python bindings for sqlkit via PyO3.
//!
//! Exposes the tool registry and the most common conversions to a Python
//! host. Enabled with the `python` feature flag.
//!
//! ## Usage from Python
//!
//! ```python
//! import sqlkit
//!
//! # Invoke any tool with JSON parameters; returns the response as JSON
//! response = sqlkit.invoke("convert", '{"sql": "SELECT 1", "target_dialect": "tsql"}')
//!
//! # Convert between dialects
//! sqlkit.transpile("SELECT `id` FROM t LIMIT 5", "mysql", "postgres")
//!
//! # Pretty-print
//! print(sqlkit.format_sql("select id,name from users where age>18", "postgres"))
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::dialect::Dialect;
use crate::error::SqlToolError;
use crate::plugin::ToolRegistry;
use crate::tools::beautify::beautify;
use crate::tools::convert::transpile as transpile_sql;

fn to_py_err(err: SqlToolError) -> PyErr {
    PyValueError::new_err(format!("{}: {}", err.display_prefix(), err))
}

/// Invoke a tool by name.
///
/// Args:
///     tool: Tool name, e.g. "beautify".
///     parameters_json: The tool parameters as a JSON object string.
///
/// Returns:
///     The response `{"success": ..., "messages": [...]}` as a JSON string.
///     Tool failures are reported in the response, not raised.
///
/// Raises:
///     ValueError: If `parameters_json` is not valid JSON.
#[pyfunction]
fn invoke(tool: &str, parameters_json: &str) -> PyResult<String> {
    let parameters: serde_json::Value = serde_json::from_str(parameters_json)
        .map_err(|e| PyValueError::new_err(format!("Invalid parameters JSON: {}", e)))?;
    let response = ToolRegistry::with_defaults().invoke(tool, &parameters);
    serde_json::to_string(&response)
        .map_err(|e| PyValueError::new_err(format!("Failed to serialize response: {}", e)))
}

/// Names of every supported dialect.
#[pyfunction]
fn supported_dialects() -> Vec<&'static str> {
    Dialect::ALL.iter().map(|d| d.name()).collect()
}

/// Convert SQL from one dialect to another, one string per statement.
///
/// Args:
///     sql: SQL text with one or more statements.
///     read: Source dialect; an empty string means auto-detect.
///     write: Target dialect.
///
/// Raises:
///     ValueError: On unknown dialects or unparseable SQL.
#[pyfunction]
fn transpile(sql: &str, read: &str, write: &str) -> PyResult<Vec<String>> {
    let read = Dialect::from_param(Some(read)).map_err(to_py_err)?;
    let write: Dialect = write.parse().map_err(to_py_err)?;
    transpile_sql(sql, read, write, false).map_err(to_py_err)
}

/// Pretty-print SQL in the given dialect (empty for generic).
#[pyfunction]
fn format_sql(sql: &str, dialect: &str) -> PyResult<String> {
    let dialect = Dialect::from_param(Some(dialect)).map_err(to_py_err)?;
    beautify(sql, dialect, false, false)
        .map(|statements| statements.join(";\n\n"))
        .map_err(to_py_err)
}

/// sqlkit Python module.
#[pymodule]
fn _sqlkit(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(invoke, m)?)?;
    m.add_function(wrap_pyfunction!(supported_dialects, m)?)?;
    m.add_function(wrap_pyfunction!(transpile, m)?)?;
    m.add_function(wrap_pyfunction!(format_sql, m)?)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_dialects() {
        let dialects = supported_dialects();
        assert_eq!(dialects.len(), 31);
        assert!(dialects.contains(&"tsql"));
    }

    #[test]
    fn test_invoke_returns_response_json() {
        let response = invoke("beautify", r#"{"sql": "select 1"}"#).unwrap();
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_transpile() {
        let result = transpile("SELECT 1; SELECT 2", "", "postgres").unwrap();
        assert_eq!(result, vec!["SELECT 1", "SELECT 2"]);
    }
}
