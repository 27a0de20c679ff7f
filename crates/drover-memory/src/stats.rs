//! Per-task statistics computed from the raw trace.
//!
//! The store keeps payloads opaque; this module decodes them just enough to
//! answer "how did this run go" for the `stats` command.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use drover_core::{RecordFilter, RecordKind, TaskId, ToolResult, ToolStatus};

use crate::store::MemoryStore;

/// Outcome counters for one task's trace.
///
/// Steps are counted once by their final attempt; `total_attempts` keeps the
/// raw invocation count so retry churn stays visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub task_id: TaskId,
    /// Plans the brain produced (`Done` directives excluded).
    pub plans: u64,
    pub steps_succeeded: u64,
    pub steps_failed: u64,
    /// Steps a policy decision denied, post-escalation denials included.
    pub steps_denied: u64,
    pub hitl_requests: u64,
    pub hitl_approved: u64,
    /// Every recorded tool invocation attempt.
    pub total_attempts: u64,
    /// Succeeded over executed steps; 0.0 when nothing executed.
    pub success_rate: f64,
}

/// Fold a task's trace into [`RunStatistics`].
pub fn run_statistics(
    store: &dyn MemoryStore,
    task_id: TaskId,
) -> drover_core::Result<RunStatistics> {
    let records = store.query(task_id, &RecordFilter::default())?;

    let mut plans = 0u64;
    let mut steps_denied = 0u64;
    let mut hitl_requests = 0u64;
    let mut hitl_approved = 0u64;
    let mut total_attempts = 0u64;
    // Records arrive in sequence order, so the last insert per step wins.
    let mut final_status: HashMap<Uuid, ToolStatus> = HashMap::new();

    for record in &records {
        match record.kind {
            RecordKind::Plan => {
                if record.payload.get("kind").and_then(Value::as_str) == Some("plan") {
                    plans += 1;
                }
            }
            RecordKind::Result => {
                if let Ok(result) = serde_json::from_value::<ToolResult>(record.payload.clone()) {
                    total_attempts += 1;
                    final_status.insert(result.step_id, result.status);
                }
            }
            RecordKind::Decision => {
                if record.payload.get("verdict").and_then(Value::as_str) == Some("deny") {
                    steps_denied += 1;
                }
            }
            RecordKind::Hitl => match record.payload.get("decision").and_then(Value::as_str) {
                // The request half of the exchange carries no decision.
                None => hitl_requests += 1,
                Some("approve") => hitl_approved += 1,
                Some(_) => {}
            },
            RecordKind::Step => {}
        }
    }

    let executed = final_status.len() as u64;
    let steps_succeeded = final_status
        .values()
        .filter(|status| **status == ToolStatus::Success)
        .count() as u64;
    let success_rate = if executed == 0 {
        0.0
    } else {
        steps_succeeded as f64 / executed as f64
    };

    Ok(RunStatistics {
        task_id,
        plans,
        steps_succeeded,
        steps_failed: executed - steps_succeeded,
        steps_denied,
        hitl_requests,
        hitl_approved,
        total_attempts,
        success_rate,
    })
}
