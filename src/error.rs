use thiserror::Error;

/// Errors surfaced by the SQL tools.
///
/// Every variant is converted into a structured failure response at the tool
/// boundary, see [`crate::plugin::ToolRegistry::invoke`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlToolError {
    /// Malformed SQL under the selected (or generic) dialect.
    #[error("{message}")]
    Parse {
        message: String,
        /// 1-based line of the failure, when known.
        line: Option<usize>,
        /// 1-based column of the failure, when known.
        column: Option<usize>,
    },
    #[error("Unsupported dialect: '{0}'")]
    UnsupportedDialect(String),
    /// Optimizer schema inconsistent with the query.
    #[error("{0}")]
    Schema(String),
    /// Executor references missing tables/columns or hits a runtime type error.
    #[error("{0}")]
    Execution(String),
    /// Missing or malformed tool parameter.
    #[error("{0}")]
    Validation(String),
}

impl SqlToolError {
    pub fn parse(message: impl Into<String>) -> Self {
        SqlToolError::Parse {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        SqlToolError::Execution(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        SqlToolError::Schema(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SqlToolError::Validation(message.into())
    }

    /// Stable tag reported to the host as `error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            SqlToolError::Parse { .. } => "ParseError",
            SqlToolError::UnsupportedDialect(_) => "UnsupportedDialect",
            SqlToolError::Schema(_) => "SchemaError",
            SqlToolError::Execution(_) => "ExecutionError",
            SqlToolError::Validation(_) => "ValidationError",
        }
    }

    /// Human readable prefix for the text message of a failure response.
    pub fn display_prefix(&self) -> &'static str {
        match self {
            SqlToolError::Parse { .. } => "SQL Parse Error",
            SqlToolError::UnsupportedDialect(_) => "Dialect Error",
            SqlToolError::Schema(_) => "Schema Error",
            SqlToolError::Execution(_) => "Query execution failed",
            SqlToolError::Validation(_) => "Invalid parameters",
        }
    }

    /// Position of a parse failure as `(line, column)`.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            SqlToolError::Parse {
                line: Some(line),
                column: Some(column),
                ..
            } => Some((*line, *column)),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqlToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_tags() {
        assert_eq!(SqlToolError::parse("x").error_type(), "ParseError");
        assert_eq!(
            SqlToolError::UnsupportedDialect("foo".into()).error_type(),
            "UnsupportedDialect"
        );
        assert_eq!(SqlToolError::schema("x").error_type(), "SchemaError");
        assert_eq!(SqlToolError::execution("x").error_type(), "ExecutionError");
        assert_eq!(SqlToolError::validation("x").error_type(), "ValidationError");
    }

    #[test]
    fn test_display() {
        let err = SqlToolError::UnsupportedDialect("oracle9".into());
        assert_eq!(err.to_string(), "Unsupported dialect: 'oracle9'");
        assert_eq!(SqlToolError::execution("boom").to_string(), "boom");
    }

    #[test]
    fn test_position() {
        let err = SqlToolError::Parse {
            message: "Expected: ), found: EOF".into(),
            line: Some(1),
            column: Some(27),
        };
        assert_eq!(err.position(), Some((1, 27)));
        assert_eq!(SqlToolError::parse("x").position(), None);
    }
}
