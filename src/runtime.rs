//! Line-delimited JSON protocol between the host and the plugin.
//!
//! Each request line is handled on Tokio's blocking pool. Responses go
//! through a channel to a single writer task, so concurrent invocations
//! never interleave on stdout.
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::InstallMethod;
use crate::manifest::Manifest;
use crate::plugin::{SqlProvider, ToolRegistry};

/// Responses buffered between handlers and the writer.
const RESPONSE_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    InvokeTool {
        tool: String,
        #[serde(default)]
        parameters: Value,
    },
    ValidateCredentials {
        #[serde(default)]
        credentials: Value,
    },
    Declaration,
}

/// Everything needed to answer requests. Immutable once built.
pub struct Plugin {
    manifest: Manifest,
    registry: ToolRegistry,
    provider: SqlProvider,
}

impl Plugin {
    /// Load the embedded manifest and check it against the registry.
    pub fn new() -> Result<Plugin> {
        let manifest = Manifest::load()?;
        let registry = ToolRegistry::with_defaults();
        manifest
            .verify(&registry)
            .context("Plugin manifest does not match the tool registry")?;
        Ok(Plugin {
            manifest,
            registry,
            provider: SqlProvider,
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Answer one request line.
    pub fn handle(&self, line: &str) -> Value {
        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => return rejection(Value::Null, format!("Invalid JSON request: {}", e)),
        };
        let id = request.get("id").cloned().unwrap_or(Value::Null);

        match serde_json::from_value::<Request>(request) {
            Err(e) => rejection(id, format!("Invalid request: {}", e)),
            Ok(Request::InvokeTool { tool, parameters }) => {
                let response = self.registry.invoke(&tool, &parameters);
                json!({
                    "id": id,
                    "success": response.success,
                    "messages": response.messages,
                })
            }
            Ok(Request::ValidateCredentials { credentials }) => {
                match self.provider.validate_credentials(&credentials) {
                    Ok(()) => json!({"id": id, "success": true}),
                    Err(e) => rejection(id, e.to_string()),
                }
            }
            Ok(Request::Declaration) => json!({
                "id": id,
                "success": true,
                "manifest": self.manifest,
                "tools": self.registry.declarations(),
            }),
        }
    }
}

fn rejection(id: Value, error: String) -> Value {
    json!({"id": id, "success": false, "error": error})
}

/// Serve requests from `input` until it closes (or after one request in
/// serverless mode). Returns `output` once every response is written.
pub async fn run<R, W>(plugin: Arc<Plugin>, input: R, output: W, mode: InstallMethod) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<String>(RESPONSE_BUFFER);
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<W, std::io::Error>(output)
    });

    let mut handlers = JoinSet::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }
        let plugin = plugin.clone();
        let tx = tx.clone();
        handlers.spawn(async move {
            let response = match tokio::task::spawn_blocking(move || plugin.handle(&line)).await {
                Ok(response) => response,
                Err(e) => rejection(Value::Null, format!("Request handler failed: {}", e)),
            };
            if tx.send(response.to_string()).await.is_err() {
                warn!("response writer closed before the response was sent");
            }
        });
        while let Some(joined) = handlers.try_join_next() {
            joined.context("Request handler task failed")?;
        }
        if mode == InstallMethod::Serverless {
            debug!("serverless mode: stopping after one request");
            break;
        }
    }

    while let Some(joined) = handlers.join_next().await {
        joined.context("Request handler task failed")?;
    }
    drop(tx);
    let output = writer
        .await
        .context("Response writer task failed")?
        .context("Failed to write response")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin() -> Plugin {
        Plugin::new().unwrap()
    }

    #[test]
    fn test_invoke_tool_request() {
        let response = plugin().handle(
            r#"{"id": 7, "type": "invoke_tool", "tool": "beautify", "parameters": {"sql": "select 1"}}"#,
        );
        assert_eq!(response["id"], 7);
        assert_eq!(response["success"], true);
        let messages = response["messages"].as_array().unwrap();
        assert_eq!(messages.last().unwrap()["type"], "json");
        assert_eq!(messages.last().unwrap()["json"]["formatted_sql"], "SELECT 1");
    }

    #[test]
    fn test_validate_credentials_request() {
        let response =
            plugin().handle(r#"{"id": "a", "type": "validate_credentials", "credentials": {}}"#);
        assert_eq!(response, json!({"id": "a", "success": true}));
    }

    #[test]
    fn test_declaration_request() {
        let response = plugin().handle(r#"{"id": 1, "type": "declaration"}"#);
        assert_eq!(response["manifest"]["name"], "sqlkit");
        let tools = response["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6);
        assert_eq!(tools[0]["name"], "convert");
        assert_eq!(tools[0]["parameters"][0]["name"], "sql");
    }

    #[test]
    fn test_malformed_requests() {
        let response = plugin().handle("not json");
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["success"], false);

        let response = plugin().handle(r#"{"id": 3, "type": "shutdown"}"#);
        assert_eq!(response["id"], 3);
        assert_eq!(response["success"], false);
    }

    #[tokio::test]
    async fn test_run_answers_every_line() {
        let input = concat!(
            r#"{"id": 1, "type": "declaration"}"#,
            "\n\n",
            r#"{"id": 2, "type": "invoke_tool", "tool": "check_syntax", "parameters": {"sql": "SELECT 1"}}"#,
            "\n"
        );
        let output = run(
            Arc::new(plugin()),
            tokio::io::BufReader::new(input.as_bytes()),
            Vec::new(),
            InstallMethod::Local,
        )
        .await
        .unwrap();
        let text = String::from_utf8(output).unwrap();
        let mut ids: Vec<i64> = text
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].as_i64().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_long_session_answers_every_request() {
        let input: String = (0..200)
            .map(|i| format!("{{\"id\": {}, \"type\": \"validate_credentials\"}}\n", i))
            .collect();
        let output = run(
            Arc::new(plugin()),
            tokio::io::BufReader::new(input.as_bytes()),
            Vec::new(),
            InstallMethod::Local,
        )
        .await
        .unwrap();
        let text = String::from_utf8(output).unwrap();
        let mut ids: Vec<i64> = text
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].as_i64().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, (0..200).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_serverless_answers_one_request() {
        let input = "{\"id\": 1, \"type\": \"declaration\"}\n{\"id\": 2, \"type\": \"declaration\"}\n";
        let output = run(
            Arc::new(plugin()),
            tokio::io::BufReader::new(input.as_bytes()),
            Vec::new(),
            InstallMethod::Serverless,
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 1);
    }
}
