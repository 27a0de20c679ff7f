//! # drover-core
//!
//! Core types, traits, and primitives for the Drover orchestration runtime.
//! This crate defines the shared vocabulary used by every other crate in the
//! workspace: tasks, plans, tool descriptors, memory records, events, and the
//! unified error type.

pub mod error;
pub mod event;
pub mod plan;
pub mod record;
pub mod task;
pub mod tool;

pub use error::{DroverError, Result};
pub use event::{Event, EventBus};
pub use plan::{Directive, Plan, Step};
pub use record::{MemoryRecord, RecordFilter, RecordKind, TraceRef};
pub use task::{Phase, RunReport, RunStatus, Task, TaskId};
pub use tool::{ToolHandler, ToolResult, ToolSpec, ToolStatus};
