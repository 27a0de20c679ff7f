use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use drover_core::{DroverError, MemoryRecord, RecordFilter, RecordKind};

use crate::store::{MemoryStore, TraceSummary};

/// Durable trace store over a single SQLite file.
///
/// One table, `(task_id, seq)` primary key. Appends run inside a transaction
/// that reads `MAX(seq)` and inserts `MAX(seq) + 1`, so sequence numbers stay
/// gap-free even with concurrent writers.
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the trace database at the given path.
    pub fn open(path: &Path) -> drover_core::Result<Self> {
        info!(?path, "opening trace store");

        let conn = Connection::open(path)
            .map_err(|e| DroverError::Memory(e.to_string()))?;

        // WAL keeps readers unblocked; synchronous=FULL because a record
        // must survive a crash once append has returned.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .map_err(|e| DroverError::Memory(e.to_string()))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS trace_records (
                task_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (task_id, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_trace_task_kind
                ON trace_records(task_id, kind);
            ",
        )
        .map_err(|e| DroverError::Memory(e.to_string()))?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> drover_core::Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Get a reference to the raw database connection (for advanced queries).
    pub fn db(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.db.lock()
    }

    fn parse_row(
        task_id: Uuid,
        seq: i64,
        kind: String,
        payload: String,
        timestamp: String,
    ) -> drover_core::Result<MemoryRecord> {
        let kind = RecordKind::parse(&kind)
            .ok_or_else(|| DroverError::Memory(format!("unknown record kind '{kind}'")))?;
        let payload: Value = serde_json::from_str(&payload)
            .map_err(|e| DroverError::Memory(format!("corrupt payload at seq {seq}: {e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| DroverError::Memory(format!("corrupt timestamp at seq {seq}: {e}")))?
            .with_timezone(&Utc);
        Ok(MemoryRecord {
            task_id,
            sequence_no: seq as u64,
            kind,
            payload,
            timestamp,
        })
    }
}

impl MemoryStore for SqliteStore {
    fn append(&self, task_id: Uuid, kind: RecordKind, payload: &Value) -> drover_core::Result<u64> {
        let mut db = self.db.lock();
        let tx = db
            .transaction()
            .map_err(|e| DroverError::MemoryWrite(e.to_string()))?;

        let next: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM trace_records WHERE task_id = ?1",
                rusqlite::params![task_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| DroverError::MemoryWrite(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO trace_records (task_id, seq, kind, payload, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                task_id.to_string(),
                next,
                kind.as_str(),
                payload.to_string(),
                now,
            ],
        )
        .map_err(|e| DroverError::MemoryWrite(e.to_string()))?;

        tx.commit()
            .map_err(|e| DroverError::MemoryWrite(e.to_string()))?;

        Ok(next as u64)
    }

    fn query(
        &self,
        task_id: Uuid,
        filter: &RecordFilter,
    ) -> drover_core::Result<Vec<MemoryRecord>> {
        // A single SELECT is a consistent snapshot; kind narrowing and the
        // limit are applied on the decoded rows.
        let rows: Vec<(i64, String, String, String)> = {
            let db = self.db.lock();
            let mut stmt = db
                .prepare(
                    "SELECT seq, kind, payload, timestamp FROM trace_records
                     WHERE task_id = ?1 AND seq > ?2
                     ORDER BY seq",
                )
                .map_err(|e| DroverError::Memory(e.to_string()))?;
            stmt.query_map(
                rusqlite::params![
                    task_id.to_string(),
                    filter.after_seq.unwrap_or(0) as i64
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map_err(|e| DroverError::Memory(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect()
        };

        let mut records = Vec::with_capacity(rows.len());
        for (seq, kind, payload, timestamp) in rows {
            let record = Self::parse_row(task_id, seq, kind, payload, timestamp)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn last_seq(&self, task_id: Uuid) -> drover_core::Result<u64> {
        let db = self.db.lock();
        let seq: i64 = db
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM trace_records WHERE task_id = ?1",
                rusqlite::params![task_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| DroverError::Memory(e.to_string()))?;
        Ok(seq as u64)
    }

    fn task_ids(&self) -> drover_core::Result<Vec<Uuid>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare("SELECT DISTINCT task_id FROM trace_records ORDER BY task_id")
            .map_err(|e| DroverError::Memory(e.to_string()))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DroverError::Memory(e.to_string()))?
            .filter_map(|r| r.ok())
            .filter_map(|s| Uuid::parse_str(&s).ok())
            .collect();
        Ok(ids)
    }

    fn summarize(&self, task_id: Uuid) -> drover_core::Result<TraceSummary> {
        let db = self.db.lock();

        let mut stmt = db
            .prepare(
                "SELECT kind, COUNT(*) FROM trace_records
                 WHERE task_id = ?1 GROUP BY kind",
            )
            .map_err(|e| DroverError::Memory(e.to_string()))?;
        let by_kind: std::collections::BTreeMap<String, u64> = stmt
            .query_map(rusqlite::params![task_id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| DroverError::Memory(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        let (total, first, last): (i64, Option<String>, Option<String>) = db
            .query_row(
                "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM trace_records
                 WHERE task_id = ?1",
                rusqlite::params![task_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| DroverError::Memory(e.to_string()))?;

        let parse_ts = |s: Option<String>| {
            s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|t| t.with_timezone(&Utc))
        };

        Ok(TraceSummary {
            task_id,
            total: total as u64,
            by_kind,
            first_recorded_at: parse_ts(first),
            last_recorded_at: parse_ts(last),
        })
    }
}
