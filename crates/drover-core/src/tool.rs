use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Description of a capability the orchestrator may invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique name, e.g. "echo", "file_read", "shell".
    pub name: String,
    /// Human-readable description, surfaced to brains and operators.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
    /// Whether re-invocation with identical arguments is safe.
    #[serde(default)]
    pub idempotent: bool,
    /// Whether this tool has side-effects (write vs read).
    #[serde(default)]
    pub mutating: bool,
    /// Risk level 0-10, consumed by policy rules deciding escalation.
    #[serde(default)]
    pub risk_level: u8,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            idempotent: false,
            mutating: false,
            risk_level: 0,
        }
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    pub fn with_risk_level(mut self, risk_level: u8) -> Self {
        self.risk_level = risk_level;
        self
    }
}

/// Outcome class of one tool invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Failure,
    Timeout,
}

/// The result of executing one step attempt against a tool.
///
/// A result is produced for every attempt, including failures and timeouts;
/// the loop never drops one silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub step_id: Uuid,
    pub tool: String,
    pub status: ToolStatus,
    /// Handler output on success, `null` otherwise.
    #[serde(default)]
    pub output: Value,
    /// Failure or timeout detail, when the attempt did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Wall-clock duration of this attempt in milliseconds.
    pub duration_ms: u64,
    /// 1-based attempt number within the step's retry budget.
    pub attempt: u32,
}

impl ToolResult {
    pub fn success(
        step_id: Uuid,
        tool: impl Into<String>,
        output: Value,
        duration_ms: u64,
        attempt: u32,
    ) -> Self {
        Self {
            step_id,
            tool: tool.into(),
            status: ToolStatus::Success,
            output,
            error_detail: None,
            duration_ms,
            attempt,
        }
    }

    pub fn failure(
        step_id: Uuid,
        tool: impl Into<String>,
        detail: impl Into<String>,
        duration_ms: u64,
        attempt: u32,
    ) -> Self {
        Self {
            step_id,
            tool: tool.into(),
            status: ToolStatus::Failure,
            output: Value::Null,
            error_detail: Some(detail.into()),
            duration_ms,
            attempt,
        }
    }

    pub fn timed_out(
        step_id: Uuid,
        tool: impl Into<String>,
        seconds: u64,
        duration_ms: u64,
        attempt: u32,
    ) -> Self {
        Self {
            step_id,
            tool: tool.into(),
            status: ToolStatus::Timeout,
            output: Value::Null,
            error_detail: Some(format!("timed out after {seconds}s")),
            duration_ms,
            attempt,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// Trait implemented by every tool handler registered with the registry.
///
/// Handlers receive already-validated arguments and return their output
/// value; the registry wraps outcomes (including errors and timeouts) into
/// `ToolResult`s.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(&self, arguments: &Value) -> crate::Result<Value>;
}
