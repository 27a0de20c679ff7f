use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::TraceRef;
use crate::tool::ToolResult;

/// Unique identifier for a task.
pub type TaskId = Uuid;

/// An immutable top-level goal submitted to the orchestrator.
///
/// A `Task` is never mutated after creation; the loop keeps its own working
/// state separately and collaborators only ever see the task by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// What the caller wants done, in plain language.
    pub objective: String,
    /// Constraints the plan must respect (informational, surfaced to the
    /// brain and to policy rules).
    #[serde(default)]
    pub constraints: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Per-task override of the configured iteration cap.
    #[serde(default)]
    pub max_steps: Option<u32>,
    /// Wall-clock deadline; checked at iteration boundaries, never mid-step.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            objective: objective.into(),
            constraints: Vec::new(),
            created_at: Utc::now(),
            max_steps: None,
            deadline: None,
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reject tasks the orchestrator cannot meaningfully run. A malformed
    /// task is a caller bug, surfaced as an error rather than a run record.
    pub fn validate(&self) -> crate::Result<()> {
        if self.objective.trim().is_empty() {
            return Err(crate::DroverError::InvalidTask(
                "objective must not be empty".into(),
            ));
        }
        if self.max_steps == Some(0) {
            return Err(crate::DroverError::InvalidTask(
                "max_steps override must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Where the control loop currently is. Terminal phases never transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Evaluating,
    Executing,
    AwaitingHuman,
    Observing,
    Done,
    Failed,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed | Phase::Aborted)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Planning => "planning",
            Phase::Evaluating => "evaluating",
            Phase::Executing => "executing",
            Phase::AwaitingHuman => "awaiting_human",
            Phase::Observing => "observing",
            Phase::Done => "done",
            Phase::Failed => "failed",
            Phase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    Failed,
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Done => f.write_str("done"),
            RunStatus::Failed => f.write_str("failed"),
            RunStatus::Aborted => f.write_str("aborted"),
        }
    }
}

/// What the orchestrator hands back when a run reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub task_id: TaskId,
    pub status: RunStatus,
    /// Why the run ended (brain summary, budget resource, fatal error text).
    pub reason: String,
    /// Tool results accumulated over the whole run, in execution order.
    pub final_observations: Vec<ToolResult>,
    /// Handle into the memory trace for this task.
    pub trace: TraceRef,
    /// Completed plan iterations.
    pub iterations: u32,
    /// Steps that actually reached a tool handler (attempts counted once).
    pub steps_executed: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
