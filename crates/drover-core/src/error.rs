use thiserror::Error;

/// Unified error type for the entire Drover runtime.
///
/// Expected domain outcomes (a policy deny, an approval timeout, a failed
/// tool attempt) are modeled as data on `PolicyDecision`/`ToolResult`, not as
/// variants here. An error reaching the caller of `run` means a contract
/// violation or a fatal condition.
#[derive(Error, Debug)]
pub enum DroverError {
    // ── Task errors ────────────────────────────────────────────
    #[error("invalid task: {0}")]
    InvalidTask(String),

    // ── Planning errors ────────────────────────────────────────
    #[error("planning failed: {0}")]
    Planning(String),

    #[error("planning timed out after {seconds}s")]
    PlanningTimeout { seconds: u64 },

    // ── Tool errors ────────────────────────────────────────────
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool registration rejected: {tool}: {reason}")]
    ToolRegistration { tool: String, reason: String },

    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("tool {tool} timed out after {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    // ── Budget errors ──────────────────────────────────────────
    #[error("budget exceeded: {resource}: used {used}, limit {limit}")]
    BudgetExceeded {
        resource: String,
        used: f64,
        limit: f64,
    },

    // ── Memory errors ──────────────────────────────────────────
    #[error("memory write failed: {0}")]
    MemoryWrite(String),

    #[error("memory error: {0}")]
    Memory(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DroverError>;
