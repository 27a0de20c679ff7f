use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use drover_core::{MemoryRecord, RecordFilter, RecordKind};

/// Append-only trace storage, keyed by task.
///
/// Contract shared by every implementation:
///
/// - `append` assigns the next sequence number for the task (starting at 1,
///   no gaps) and the record is durable to the store's durability level
///   before the call returns.
/// - `query` returns records in sequence order and is a snapshot: an append
///   racing the query is either entirely visible or entirely absent.
/// - A failed `append` is fatal to the caller's run; there is no partial
///   write to observe afterwards.
pub trait MemoryStore: Send + Sync {
    /// Append one record to the task's trace, returning its sequence number.
    fn append(&self, task_id: Uuid, kind: RecordKind, payload: &Value) -> drover_core::Result<u64>;

    /// Read the task's trace in sequence order, narrowed by `filter`.
    fn query(&self, task_id: Uuid, filter: &RecordFilter)
    -> drover_core::Result<Vec<MemoryRecord>>;

    /// Highest sequence number appended for the task, or 0 when the trace
    /// is empty.
    fn last_seq(&self, task_id: Uuid) -> drover_core::Result<u64>;

    /// Every task id with at least one record.
    fn task_ids(&self) -> drover_core::Result<Vec<Uuid>>;

    /// Aggregate view of one task's trace: totals, per-kind counts, and the
    /// time span covered.
    fn summarize(&self, task_id: Uuid) -> drover_core::Result<TraceSummary> {
        let records = self.query(task_id, &RecordFilter::default())?;
        let mut by_kind: BTreeMap<String, u64> = BTreeMap::new();
        for record in &records {
            *by_kind.entry(record.kind.to_string()).or_insert(0) += 1;
        }
        Ok(TraceSummary {
            task_id,
            total: records.len() as u64,
            by_kind,
            first_recorded_at: records.first().map(|r| r.timestamp),
            last_recorded_at: records.last().map(|r| r.timestamp),
        })
    }
}

/// Aggregate statistics for one task's trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub task_id: Uuid,
    pub total: u64,
    pub by_kind: BTreeMap<String, u64>,
    pub first_recorded_at: Option<DateTime<Utc>>,
    pub last_recorded_at: Option<DateTime<Utc>>,
}

impl TraceSummary {
    pub fn count(&self, kind: RecordKind) -> u64 {
        self.by_kind.get(kind.as_str()).copied().unwrap_or(0)
    }
}
