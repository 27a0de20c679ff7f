use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use drover_core::{MemoryRecord, RecordFilter, RecordKind};

use crate::store::MemoryStore;

/// Trace store backed by process memory.
///
/// Keeps the full `MemoryStore` ordering contract (gap-free per-task
/// sequence numbers, snapshot queries) but records only live as long as the
/// process. For tests and runs where the trace is disposable.
#[derive(Default)]
pub struct InMemoryStore {
    traces: RwLock<HashMap<Uuid, Vec<MemoryRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryStore for InMemoryStore {
    fn append(&self, task_id: Uuid, kind: RecordKind, payload: &Value) -> drover_core::Result<u64> {
        let mut traces = self.traces.write();
        let trace = traces.entry(task_id).or_default();
        let seq = trace.len() as u64 + 1;
        trace.push(MemoryRecord {
            task_id,
            sequence_no: seq,
            kind,
            payload: payload.clone(),
            timestamp: Utc::now(),
        });
        Ok(seq)
    }

    fn query(
        &self,
        task_id: Uuid,
        filter: &RecordFilter,
    ) -> drover_core::Result<Vec<MemoryRecord>> {
        let traces = self.traces.read();
        let mut records: Vec<MemoryRecord> = traces
            .get(&task_id)
            .map(|trace| trace.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn last_seq(&self, task_id: Uuid) -> drover_core::Result<u64> {
        let traces = self.traces.read();
        Ok(traces.get(&task_id).map(|t| t.len() as u64).unwrap_or(0))
    }

    fn task_ids(&self) -> drover_core::Result<Vec<Uuid>> {
        let traces = self.traces.read();
        let mut ids: Vec<Uuid> = traces.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
