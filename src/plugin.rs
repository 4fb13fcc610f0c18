//! Plugin surface: the provider and the tool registry.
//!
//! The registry owns every tool and is the single place where tool errors
//! become failure responses. The host never sees a fault, and a failure
//! never carries partial results.
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::error::{Result, SqlToolError};
use crate::tools::convert::transpile;
use crate::tools::{
    BeautifyTool, CheckSyntaxTool, ConvertTool, ExecuteOnJsonTool, ExtractMetadataTool,
    OptimizeTool, ParameterSpec, Parameters, Tool, ToolMessage,
};

/// Credential validation for the provider. The SQL engine is local, so
/// there is nothing to authenticate; validation is an engine self-check.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlProvider;

impl SqlProvider {
    pub fn validate_credentials(&self, _credentials: &Value) -> Result<()> {
        let converted = transpile("SELECT 1", Some(Dialect::MySql), Dialect::Postgres, false)
            .map_err(|e| {
                SqlToolError::validation(format!("SQL engine validation failed: {}", e))
            })?;
        if converted.is_empty() {
            return Err(SqlToolError::validation(
                "SQL engine validation failed: unable to transpile test query",
            ));
        }
        Ok(())
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub messages: Vec<ToolMessage>,
}

impl ToolResponse {
    fn failure(err: &SqlToolError, original_sql: Option<&str>) -> Self {
        let mut payload = Map::new();
        payload.insert("success".into(), false.into());
        payload.insert("error_type".into(), err.error_type().into());
        payload.insert("error_message".into(), err.to_string().into());
        if let Some(sql) = original_sql {
            payload.insert("original_sql".into(), sql.into());
        }
        if let Some((line, column)) = err.position() {
            payload.insert("line".into(), line.into());
            payload.insert("column".into(), column.into());
        }
        ToolResponse {
            success: false,
            messages: vec![
                ToolMessage::text(format!("{}: {}", err.display_prefix(), err)),
                ToolMessage::json(Value::Object(payload)),
            ],
        }
    }

    /// The JSON message, if any.
    pub fn json(&self) -> Option<&Value> {
        self.messages.iter().find_map(ToolMessage::as_json)
    }
}

/// Tool name, description and parameters as reported to the host.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSpec>,
}

/// Central registry of the tools this plugin exposes.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all six SQL tools.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ConvertTool));
        registry.register(Box::new(BeautifyTool));
        registry.register(Box::new(ExtractMetadataTool));
        registry.register(Box::new(CheckSyntaxTool));
        registry.register(Box::new(OptimizeTool));
        registry.register(Box::new(ExecuteOnJsonTool));
        registry
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .iter()
            .map(|t| ToolDeclaration {
                name: t.name(),
                description: t.description(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Invoke a tool by name. Every error becomes a failure response.
    pub fn invoke(&self, name: &str, parameters: &Value) -> ToolResponse {
        let original_sql = parameters.get("sql").and_then(Value::as_str);
        let started = Instant::now();
        let outcome = self
            .get(name)
            .ok_or_else(|| SqlToolError::validation(format!("Unknown tool '{}'", name)))
            .and_then(|tool| {
                let params = Parameters::from_json(parameters)?;
                tool.invoke(&params)
            });
        let elapsed_us = started.elapsed().as_micros() as u64;

        match outcome {
            Ok(messages) => {
                debug!(tool = name, elapsed_us, "tool invocation succeeded");
                ToolResponse {
                    success: true,
                    messages,
                }
            }
            Err(err) => {
                warn!(tool = name, error_type = err.error_type(), elapsed_us, "tool invocation failed");
                ToolResponse::failure(&err, original_sql)
            }
        }
    }
}
