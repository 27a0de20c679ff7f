use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::task::TaskId;

/// One proposed tool invocation within a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    /// Name of the registered tool to invoke.
    pub tool: String,
    /// Arguments object, validated against the tool's schema before dispatch.
    pub arguments: Value,
    /// What the brain expects this step to accomplish.
    pub expected_effect: String,
    /// Whether re-invoking with identical arguments is safe. Only idempotent
    /// steps are retried after transient failures.
    #[serde(default)]
    pub idempotent: bool,
}

impl Step {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool: tool.into(),
            arguments,
            expected_effect: String::new(),
            idempotent: false,
        }
    }

    pub fn with_expected_effect(mut self, effect: impl Into<String>) -> Self {
        self.expected_effect = effect.into();
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }
}

/// An ordered sequence of steps for one loop iteration.
///
/// Each iteration replaces the previous plan; superseded plans survive only
/// in the memory trace and are never re-executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub task_id: TaskId,
    pub steps: Vec<Step>,
    /// Why the brain chose these steps.
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(task_id: TaskId, steps: Vec<Step>, rationale: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            steps,
            rationale: rationale.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// What the brain hands back from a planning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Execute these steps next.
    Plan(Plan),
    /// The task is complete; no further steps.
    Done { summary: String },
}

impl Directive {
    pub fn done(summary: impl Into<String>) -> Self {
        Directive::Done {
            summary: summary.into(),
        }
    }
}
