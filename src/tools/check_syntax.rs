use serde_json::{json, Value};
use tracing::debug;

use super::{dialect_param, sql_param, ParameterSpec, Parameters, Tool, ToolMessage};
use crate::ast::{format_with, parse_sql, GenerateOptions};
use crate::dialect::Dialect;
use crate::error::{Result, SqlToolError};

/// Characters of context reported on each side of a syntax error.
const CONTEXT_CHARS: usize = 100;

/// Syntax validation. A parse failure is reported, not raised.
pub struct CheckSyntaxTool;

impl Tool for CheckSyntaxTool {
    fn name(&self) -> &'static str {
        "check_syntax"
    }

    fn description(&self) -> &'static str {
        "Check SQL syntax and report the position of the first error."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![sql_param(), dialect_param()]
    }

    fn invoke(&self, params: &Parameters) -> Result<Vec<ToolMessage>> {
        let sql = params.sql()?;
        let dialect = params.dialect("dialect")?;

        let queries = match parse_sql(sql, dialect) {
            Ok(queries) => queries,
            Err(err) => {
                debug!(dialect = Dialect::label(dialect), "syntax check failed");
                return Ok(failure_report(sql, dialect, &err));
            }
        };

        if queries.is_empty() {
            return Ok(vec![
                ToolMessage::text("No valid SQL statements found in the query."),
                ToolMessage::json(json!({
                    "valid": false,
                    "error": "No valid SQL statements found",
                    "original_sql": sql,
                })),
            ]);
        }

        let opts = GenerateOptions::for_dialect(dialect);
        let statements: Vec<Value> = queries
            .iter()
            .enumerate()
            .map(|(i, q)| {
                json!({
                    "index": i + 1,
                    "type": q.kind().to_string(),
                    "sql": format_with(q, &opts),
                })
            })
            .collect();
        let types: Vec<String> = queries.iter().map(|q| q.kind().to_string()).collect();
        debug!(
            dialect = Dialect::label(dialect),
            statements = queries.len(),
            "syntax check passed"
        );

        Ok(vec![
            ToolMessage::text(format!(
                "✓ SQL is valid! Found {} statement(s).",
                queries.len()
            )),
            ToolMessage::text(format!("Statement types: {}", types.join(", "))),
            ToolMessage::json(json!({
                "valid": true,
                "dialect": Dialect::label(dialect),
                "statement_count": queries.len(),
                "statements": statements,
                "warnings": Vec::<String>::new(),
                "original_sql": sql,
            })),
        ])
    }
}

fn failure_report(sql: &str, dialect: Option<Dialect>, err: &SqlToolError) -> Vec<ToolMessage> {
    let message = err.to_string();
    let (line, column) = err.position().unwrap_or((1, 1));
    let excerpt = excerpt(sql, line, column);
    let (start_context, highlight, end_context) = context(sql, line, column);

    let report = json!({
        "valid": false,
        "error_type": err.error_type(),
        "error_message": message,
        "line": line,
        "column": column,
        "excerpt": excerpt,
        "error_details": [{
            "description": message,
            "line": line,
            "col": column,
            "start_context": start_context,
            "highlight": highlight,
            "end_context": end_context,
        }],
        "dialect": Dialect::label(dialect),
        "original_sql": sql,
    });
    vec![
        ToolMessage::text(format!(
            "✗ SQL Validation Failed: {} (line {}, column {})\n{}",
            message, line, column, excerpt
        )),
        ToolMessage::json(report),
    ]
}

/// The failing source line with a caret under `column`.
pub fn excerpt(sql: &str, line: usize, column: usize) -> String {
    let source = sql.lines().nth(line.saturating_sub(1)).unwrap_or("");
    format!("{}\n{}^", source, " ".repeat(column.saturating_sub(1)))
}

/// Char offset of a 1-based position, clamped to the input.
fn offset_of(sql: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, text) in sql.split('\n').enumerate() {
        let len = text.chars().count();
        if i + 1 == line {
            return offset + column.saturating_sub(1).min(len);
        }
        offset += len + 1;
    }
    sql.chars().count()
}

/// Text before the error, the token at it, and text after it.
fn context(sql: &str, line: usize, column: usize) -> (String, String, String) {
    let chars: Vec<char> = sql.chars().collect();
    let start = offset_of(sql, line, column).min(chars.len());
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    if end == start && end < chars.len() {
        end += 1;
    }
    let before: String = chars[start.saturating_sub(CONTEXT_CHARS)..start].iter().collect();
    let highlight: String = chars[start..end].iter().collect();
    let after: String = chars[end..(end + CONTEXT_CHARS).min(chars.len())].iter().collect();
    (before, highlight, after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sql: &str) -> Value {
        let params = Parameters::from_json(&json!({ "sql": sql })).unwrap();
        let messages = CheckSyntaxTool.invoke(&params).unwrap();
        messages.iter().find_map(ToolMessage::as_json).cloned().unwrap()
    }

    #[test]
    fn test_unclosed_parenthesis_position() {
        let r = report("SELECT * FROM users WHERE (id = 1 AND name = 'John'");
        assert_eq!(r["valid"], false);
        assert_eq!(r["error_type"], "ParseError");
        assert_eq!(r["line"], 1);
        assert_eq!(r["column"], 27);
        assert_eq!(
            r["excerpt"],
            "SELECT * FROM users WHERE (id = 1 AND name = 'John'\n                          ^"
        );
        assert_eq!(r["error_details"][0]["highlight"], "(");
    }

    #[test]
    fn test_valid_statements() {
        let r = report("select 1; update t set a = 2");
        assert_eq!(r["valid"], true);
        assert_eq!(r["statement_count"], 2);
        assert_eq!(r["statements"][0]["type"], "Select");
        assert_eq!(r["statements"][1]["type"], "Update");
        assert_eq!(r["statements"][1]["index"], 2);
        assert_eq!(r["warnings"], json!([]));
    }

    #[test]
    fn test_comment_only_input() {
        let r = report("-- nothing here");
        assert_eq!(r["valid"], false);
        assert_eq!(r["error"], "No valid SQL statements found");
    }

    #[test]
    fn test_multiline_position() {
        let r = report("SELECT a\nFROM t\nWHERE a = = 1");
        assert_eq!(r["valid"], false);
        assert_eq!(r["line"], 3);
    }

    #[test]
    fn test_unsupported_dialect_is_a_failure() {
        let params = Parameters::from_json(&json!({"sql": "SELECT 1", "dialect": "x"})).unwrap();
        let err = CheckSyntaxTool.invoke(&params).unwrap_err();
        assert_eq!(err.error_type(), "UnsupportedDialect");
    }

    #[test]
    fn test_context_split() {
        let (before, highlight, after) = context("SELECT foo bar", 1, 8);
        assert_eq!(before, "SELECT ");
        assert_eq!(highlight, "foo");
        assert_eq!(after, " bar");
    }
}
