//! The six SQL tools and the types they share.
//!
//! A tool reads its [`Parameters`], does its work synchronously and returns
//! the messages of a successful response. Failures are plain
//! [`SqlToolError`]s; the registry turns them into failure responses.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::dialect::Dialect;
use crate::error::{Result, SqlToolError};

pub mod beautify;
pub mod check_syntax;
pub mod convert;
pub mod execute_on_json;
pub mod extract_metadata;
pub mod optimize;

pub use beautify::BeautifyTool;
pub use check_syntax::CheckSyntaxTool;
pub use convert::ConvertTool;
pub use execute_on_json::ExecuteOnJsonTool;
pub use extract_metadata::ExtractMetadataTool;
pub use optimize::OptimizeTool;

/// Trait implemented by every tool the plugin exposes.
pub trait Tool: Send + Sync {
    /// Name the host uses to invoke the tool.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Parameter schema reported in the declaration.
    fn parameters(&self) -> Vec<ParameterSpec>;

    fn invoke(&self, params: &Parameters) -> Result<Vec<ToolMessage>>;
}

/// One message of a tool response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolMessage {
    Text { text: String },
    Json { json: Value },
}

impl ToolMessage {
    pub fn text(text: impl Into<String>) -> Self {
        ToolMessage::Text { text: text.into() }
    }

    pub fn json(json: Value) -> Self {
        ToolMessage::Json { json }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ToolMessage::Json { json } => Some(json),
            ToolMessage::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Boolean,
    Object,
}

/// Declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        ParameterSpec {
            name,
            kind,
            required: true,
            description,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        ParameterSpec {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Shared spec for the optional `dialect` parameter.
pub(crate) fn dialect_param() -> ParameterSpec {
    ParameterSpec::optional(
        "dialect",
        ParamKind::String,
        "SQL dialect of the input. Leave empty to auto-detect.",
    )
}

pub(crate) fn sql_param() -> ParameterSpec {
    ParameterSpec::required("sql", ParamKind::String, "The SQL text to process.")
}

/// The `parameters` object of an invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: Map<String, Value>,
}

impl Parameters {
    /// Accepts a JSON object; `null` means no parameters.
    pub fn from_json(value: &Value) -> Result<Parameters> {
        match value {
            Value::Object(values) => Ok(Parameters {
                values: values.clone(),
            }),
            Value::Null => Ok(Parameters::default()),
            _ => Err(SqlToolError::validation(
                "Tool parameters must be a JSON object.",
            )),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// The required, non-blank `sql` parameter.
    pub fn sql(&self) -> Result<&str> {
        self.required_str("sql", "SQL query is required.")
    }

    /// A string parameter that must be present and non-blank.
    pub fn required_str(&self, name: &str, missing: &str) -> Result<&str> {
        match self.optional_str(name)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(SqlToolError::validation(missing)),
        }
    }

    pub fn optional_str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(SqlToolError::validation(format!(
                "Parameter '{}' must be a string.",
                name
            ))),
        }
    }

    /// Optional dialect name; blank means auto-detect.
    pub fn dialect(&self, name: &str) -> Result<Option<Dialect>> {
        Dialect::from_param(self.optional_str(name)?)
    }

    /// Boolean flag given as a JSON boolean or the string `"true"`/`"false"`.
    pub fn flag(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                "" => Ok(default),
                _ => Err(SqlToolError::validation(format!(
                    "Parameter '{}' must be true or false, got '{}'.",
                    name, s
                ))),
            },
            Some(_) => Err(SqlToolError::validation(format!(
                "Parameter '{}' must be a boolean.",
                name
            ))),
        }
    }

    /// A JSON payload parameter; a blank string counts as absent.
    pub fn payload(&self, name: &str) -> Option<&Value> {
        match self.get(name) {
            Some(Value::String(s)) if s.trim().is_empty() => None,
            other => other,
        }
    }
}

/// Pretty-printed SQL in a Markdown code fence.
pub(crate) fn sql_block(title: &str, sql: &str) -> ToolMessage {
    ToolMessage::text(format!("\n**{}:**\n```sql\n{}\n```", title, sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        Parameters::from_json(&value).unwrap()
    }

    #[test]
    fn test_required_sql() {
        assert_eq!(params(json!({"sql": "SELECT 1"})).sql().unwrap(), "SELECT 1");
        let err = params(json!({"sql": "   "})).sql().unwrap_err();
        assert_eq!(err.error_type(), "ValidationError");
        assert!(params(json!({})).sql().is_err());
        assert!(params(json!({"sql": 5})).sql().is_err());
    }

    #[test]
    fn test_flags() {
        let p = params(json!({"a": true, "b": "false", "c": "TRUE", "d": "maybe", "e": 1}));
        assert!(p.flag("a", false).unwrap());
        assert!(!p.flag("b", true).unwrap());
        assert!(p.flag("c", false).unwrap());
        assert!(p.flag("d", false).is_err());
        assert!(p.flag("e", false).is_err());
        assert!(p.flag("missing", true).unwrap());
    }

    #[test]
    fn test_dialect_param() {
        let p = params(json!({"dialect": " MySQL ", "empty": "", "bad": "cobol"}));
        assert_eq!(p.dialect("dialect").unwrap(), Some(Dialect::MySql));
        assert_eq!(p.dialect("empty").unwrap(), None);
        assert_eq!(p.dialect("missing").unwrap(), None);
        assert_eq!(p.dialect("bad").unwrap_err().error_type(), "UnsupportedDialect");
    }

    #[test]
    fn test_non_object_parameters() {
        assert!(Parameters::from_json(&json!(null)).unwrap().get("sql").is_none());
        assert!(Parameters::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_message_serialization() {
        assert_eq!(
            serde_json::to_value(ToolMessage::text("hi")).unwrap(),
            json!({"type": "text", "text": "hi"})
        );
        assert_eq!(
            serde_json::to_value(ToolMessage::json(json!({"a": 1}))).unwrap(),
            json!({"type": "json", "json": {"a": 1}})
        );
    }

    #[test]
    fn test_parameter_spec_serialization() {
        let spec = ParameterSpec::optional("pretty", ParamKind::Boolean, "Pretty print.")
            .with_default(json!(true));
        assert_eq!(
            serde_json::to_value(spec).unwrap(),
            json!({
                "name": "pretty",
                "type": "boolean",
                "required": false,
                "description": "Pretty print.",
                "default": true
            })
        );
    }
}
