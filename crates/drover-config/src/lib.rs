//! # drover-config
//!
//! Configuration system for the Drover runtime. Reads `drover.toml`, then
//! applies `DROVER_*` environment overrides; CLI flags override both at the
//! call site. Every section has complete defaults, so a missing file is not
//! an error.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::DroverConfig;
pub use schema::{
    ConfigWarning, DriverConfig, HitlConfig, LoggingConfig, MemoryConfig, OrchestratorConfig,
    PlannerConfig, PlannerRuleConfig, PlannerStepConfig, PolicyConfig, RetryConfig,
    WarningSeverity,
};
