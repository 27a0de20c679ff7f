//! Built-in tools that ship with the runtime: enough to exercise real runs
//! without any external integration.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use drover_core::{DroverError, ToolHandler, ToolSpec};

use crate::registry::ToolRegistry;

fn require_str<'a>(arguments: &'a Value, key: &str, tool: &str) -> drover_core::Result<&'a str> {
    arguments[key]
        .as_str()
        .ok_or_else(|| DroverError::ToolExecution {
            tool: tool.into(),
            reason: format!("missing '{key}' argument"),
        })
}

/// Echoes its input back. Harmless; useful for wiring checks and tests.
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn run(&self, arguments: &Value) -> drover_core::Result<Value> {
        let text = require_str(arguments, "text", "echo")?;
        Ok(json!({ "text": text }))
    }
}

impl EchoTool {
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "echo",
            "Echo a text value back unchanged",
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "The text to echo" }
                },
                "required": ["text"],
                "additionalProperties": false
            }),
        )
        .idempotent()
    }
}

/// Reads a file from the local filesystem.
pub struct FileReadTool;

#[async_trait]
impl ToolHandler for FileReadTool {
    async fn run(&self, arguments: &Value) -> drover_core::Result<Value> {
        let path = require_str(arguments, "path", "file_read")?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DroverError::ToolExecution {
                tool: "file_read".into(),
                reason: format!("error reading {path}: {e}"),
            })?;
        Ok(json!({
            "path": path,
            "content": content.chars().take(50_000).collect::<String>(),
        }))
    }
}

impl FileReadTool {
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "file_read",
            "Read the contents of a file",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to the file to read" }
                },
                "required": ["path"]
            }),
        )
        .idempotent()
        .with_risk_level(1)
    }
}

/// Writes a file, creating parent directories as needed.
pub struct FileWriteTool;

#[async_trait]
impl ToolHandler for FileWriteTool {
    async fn run(&self, arguments: &Value) -> drover_core::Result<Value> {
        let path = require_str(arguments, "path", "file_write")?;
        let content = require_str(arguments, "content", "file_write")?;

        if let Some(parent) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| DroverError::ToolExecution {
                tool: "file_write".into(),
                reason: format!("error writing {path}: {e}"),
            })?;

        Ok(json!({ "path": path, "bytes_written": content.len() }))
    }
}

impl FileWriteTool {
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "file_write",
            "Write content to a file, creating parent directories",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to write" },
                    "content": { "type": "string", "description": "The file content" }
                },
                "required": ["path", "content"]
            }),
        )
        .idempotent()
        .mutating()
        .with_risk_level(4)
    }
}

/// Runs a non-interactive shell command. Stdin is /dev/null so anything
/// that prompts fails fast instead of hanging.
pub struct ShellTool;

#[async_trait]
impl ToolHandler for ShellTool {
    async fn run(&self, arguments: &Value) -> drover_core::Result<Value> {
        let command = require_str(arguments, "command", "shell")?;
        let working_dir = arguments["working_dir"].as_str();

        info!(command, "executing shell command");

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.stdin(std::process::Stdio::null());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| DroverError::ToolExecution {
            tool: "shell".into(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            return Err(DroverError::ToolExecution {
                tool: "shell".into(),
                reason: format!(
                    "exit code {}: {}",
                    exit_code,
                    stderr.chars().take(2_000).collect::<String>()
                ),
            });
        }

        Ok(json!({
            "exit_code": exit_code,
            "stdout": stdout.chars().take(10_000).collect::<String>(),
            "stderr": stderr.chars().take(5_000).collect::<String>(),
        }))
    }
}

impl ShellTool {
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "shell",
            "Run a non-interactive shell command and return stdout/stderr",
            json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute (no TTY)"
                    },
                    "working_dir": {
                        "type": "string",
                        "description": "Working directory (optional)"
                    }
                },
                "required": ["command"]
            }),
        )
        .mutating()
        .with_risk_level(6)
    }
}

/// Register the built-in tool set with a registry.
pub fn register_builtins(registry: &ToolRegistry) -> drover_core::Result<()> {
    registry.register(EchoTool::spec(), Arc::new(EchoTool))?;
    registry.register(FileReadTool::spec(), Arc::new(FileReadTool))?;
    registry.register(FileWriteTool::spec(), Arc::new(FileWriteTool))?;
    registry.register(ShellTool::spec(), Arc::new(ShellTool))?;
    Ok(())
}
