use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::TaskId;

/// What kind of event a memory record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A plan produced by the brain.
    Plan,
    /// A step about to be evaluated (context snapshot).
    Step,
    /// One tool invocation attempt's result.
    Result,
    /// A policy decision (including post-escalation resolutions).
    Decision,
    /// A human approval request or response.
    Hitl,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Plan => "plan",
            RecordKind::Step => "step",
            RecordKind::Result => "result",
            RecordKind::Decision => "decision",
            RecordKind::Hitl => "hitl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plan" => Some(RecordKind::Plan),
            "step" => Some(RecordKind::Step),
            "result" => Some(RecordKind::Result),
            "decision" => Some(RecordKind::Decision),
            "hitl" => Some(RecordKind::Hitl),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only entry in a task's audit trail.
///
/// Sequence numbers are assigned by the store, strictly increasing and
/// gap-free per task; they define the canonical event order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub task_id: TaskId,
    pub sequence_no: u64,
    pub kind: RecordKind,
    /// Serialized plan/result/decision/request, uninterpreted by the store.
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Narrowing options for a trace query. A default filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Restrict to these kinds (empty = all kinds).
    pub kinds: Vec<RecordKind>,
    /// Only records with sequence_no strictly greater than this.
    pub after_seq: Option<u64>,
    /// Cap on returned records (applied after ordering).
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn kind(kind: RecordKind) -> Self {
        Self {
            kinds: vec![kind],
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind) {
            return false;
        }
        if let Some(after) = self.after_seq {
            if record.sequence_no <= after {
                return false;
            }
        }
        true
    }
}

/// Handle to a task's trace, returned from a run so callers can audit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRef {
    pub task_id: TaskId,
    /// Highest sequence number written during the run (0 = nothing written).
    pub last_seq: u64,
}
