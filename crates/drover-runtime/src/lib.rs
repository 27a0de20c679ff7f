//! # drover-runtime
//!
//! The runtime wires the pieces into the control loop: the [`Orchestrator`]
//! drives plan–act–observe against a [`ToolRegistry`], records everything in
//! the trace store, and holds every step to policy and approval before a
//! handler runs. [`RunDriver`] repeats runs on an interval for unattended
//! operation.

pub mod builtin;
pub mod driver;
pub mod orchestrator;
pub mod registry;
pub mod schema;

pub use builtin::register_builtins;
pub use driver::RunDriver;
pub use orchestrator::{Orchestrator, RetryPolicy, RunConfig};
pub use registry::ToolRegistry;
