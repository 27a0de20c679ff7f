//! # drover-memory
//!
//! The append-only trace store. Every plan, step, result, policy decision,
//! and approval exchange lands here as a [`drover_core::MemoryRecord`] with a
//! store-assigned sequence number that is gap-free and strictly increasing
//! per task. The trace is the audit trail: if a run's report says a step
//! executed, the trace proves it.
//!
//! Two implementations of [`MemoryStore`]:
//!
//! - [`SqliteStore`] — durable, one SQLite file, the default for real runs.
//! - [`InMemoryStore`] — same ordering contract without persistence, for
//!   tests and throwaway runs.

pub mod inmem;
pub mod sqlite;
pub mod stats;
pub mod store;

pub use inmem::InMemoryStore;
pub use sqlite::SqliteStore;
pub use stats::{RunStatistics, run_statistics};
pub use store::{MemoryStore, TraceSummary};
