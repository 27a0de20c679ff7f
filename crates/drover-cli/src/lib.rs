//! # drover-cli
//!
//! Command-line interface for the Drover orchestration runtime.
//!
//! ## Commands
//!
//! - `drover run` — run one task through the plan–act–observe loop
//! - `drover loop` — re-run a task on a fixed interval
//! - `drover trace` — show the recorded trace of a task
//! - `drover stats` — per-task outcome statistics from the trace
//! - `drover tools` — list the built-in tools and their risk metadata
//! - `drover config` — show the resolved configuration
//! - `drover init` — write a starter drover.toml

pub mod commands;

pub use commands::Cli;
