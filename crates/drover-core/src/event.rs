use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::task::{Phase, RunStatus};
use crate::tool::ToolStatus;

/// Events flowing out of the control loop — everything observers need to
/// follow a run without reaching into loop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    // ── Run lifecycle ──────────────────────────────────────────
    TaskStarted {
        task_id: Uuid,
        objective: String,
    },
    PhaseChanged {
        task_id: Uuid,
        phase: Phase,
    },
    TaskFinished {
        task_id: Uuid,
        status: RunStatus,
        reason: String,
    },

    // ── Planning ───────────────────────────────────────────────
    PlanProduced {
        task_id: Uuid,
        plan_id: Uuid,
        steps: usize,
    },
    PlanningFailed {
        task_id: Uuid,
        attempt: u32,
        error: String,
    },

    // ── Policy & approval ──────────────────────────────────────
    StepDenied {
        task_id: Uuid,
        step_id: Uuid,
        rule_id: String,
        reason: String,
    },
    StepEscalated {
        task_id: Uuid,
        step_id: Uuid,
        reason: String,
    },
    ApprovalResolved {
        task_id: Uuid,
        step_id: Uuid,
        approved: bool,
        timed_out: bool,
    },

    // ── Execution ──────────────────────────────────────────────
    StepExecuted {
        task_id: Uuid,
        step_id: Uuid,
        tool: String,
        status: ToolStatus,
        attempt: u32,
    },

    // ── System ─────────────────────────────────────────────────
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for run observability.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: Event) {
        // Ignore send errors (no subscribers).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}
