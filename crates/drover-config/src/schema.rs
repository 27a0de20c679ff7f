use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration — maps to `drover.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DroverConfig {
    pub orchestrator: OrchestratorConfig,
    pub retry: RetryConfig,
    pub policy: PolicyConfig,
    pub hitl: HitlConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
    pub driver: DriverConfig,
    pub planner: PlannerConfig,
}

// ── Orchestrator ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Hard cap on plan iterations per run. A task carrying its own
    /// `max_steps` overrides this for that run.
    pub max_steps: u32,
    /// Seconds the brain gets per planning call.
    pub planning_timeout_secs: u64,
    /// Extra planning attempts after a failure before the run fails.
    pub planning_retries: u32,
    /// Seconds one tool invocation attempt may take.
    pub step_timeout_secs: u64,
}

impl OrchestratorConfig {
    pub fn planning_timeout(&self) -> Duration {
        Duration::from_secs(self.planning_timeout_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            planning_timeout_secs: 30,
            planning_retries: 2,
            step_timeout_secs: 60,
        }
    }
}

// ── Retry ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per idempotent step, first try included. Non-idempotent
    /// steps always get exactly one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Each further retry multiplies the delay by this factor.
    pub backoff_multiplier: f64,
    /// Ceiling on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            backoff_multiplier: 2.0,
            max_delay_ms: 5_000,
        }
    }
}

// ── Policy ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Verdict when no rule matches: "deny" (fail closed) or "allow".
    pub default_verdict: String,
    /// Tools that are always blocked.
    pub denylist: Vec<String>,
    /// When non-empty, tools not listed here are denied.
    pub allowlist: Vec<String>,
    /// Escalate steps whose tool risk level (0-10) exceeds this.
    pub risk_threshold: Option<u8>,
    /// Escalate every step whose tool declares itself mutating.
    pub escalate_mutating: bool,
    /// Regexes matched against the serialized step arguments; a match
    /// denies the step.
    pub denied_argument_patterns: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_verdict: "deny".into(),
            denylist: vec![],
            allowlist: vec![],
            risk_threshold: Some(7),
            escalate_mutating: true,
            denied_argument_patterns: vec![],
        }
    }
}

// ── HITL ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HitlConfig {
    /// Seconds to wait for a human answer before treating the request as
    /// denied.
    pub timeout_secs: u64,
}

impl HitlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HitlConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path to the SQLite trace database.
    pub db_path: PathBuf,
    /// Keep the trace in process memory only; nothing survives exit.
    pub in_memory: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("drover.db"),
            in_memory: false,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Driver ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Seconds between loop-mode rounds.
    pub interval_secs: u64,
    /// Stop after this many rounds. Unset runs until cancelled.
    pub max_runs: Option<u32>,
}

impl DriverConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_runs: None,
        }
    }
}

// ── Planner ────────────────────────────────────────────────────

/// Rules for the deterministic reference brain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub rules: Vec<PlannerRuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerRuleConfig {
    pub name: String,
    /// Case-insensitive substring matched against the task objective.
    pub trigger: String,
    pub steps: Vec<PlannerStepConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerStepConfig {
    pub tool: String,
    /// Arguments template; `{objective}` and `{task_id}` are substituted in
    /// string values at planning time.
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub expected_effect: String,
    #[serde(default)]
    pub idempotent: bool,
}

// ── Default for root ───────────────────────────────────────────

impl Default for DroverConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            retry: RetryConfig::default(),
            policy: PolicyConfig::default(),
            hitl: HitlConfig::default(),
            memory: MemoryConfig::default(),
            logging: LoggingConfig::default(),
            driver: DriverConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl DroverConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Orchestrator limits ───
        if self.orchestrator.max_steps == 0 {
            warnings.push(ConfigWarning {
                field: "orchestrator.max_steps".into(),
                message: "max_steps is 0 — no iteration can ever start".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 20".into()),
            });
        }
        if self.orchestrator.planning_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "orchestrator.planning_timeout_secs".into(),
                message: "planning timeout is 0 — every planning call times out".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 30".into()),
            });
        }
        if self.orchestrator.step_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "orchestrator.step_timeout_secs".into(),
                message: "step timeout is 0 — every tool invocation times out".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60".into()),
            });
        }

        // ── Retry ───
        if self.retry.max_attempts == 0 {
            warnings.push(ConfigWarning {
                field: "retry.max_attempts".into(),
                message: "max_attempts 0 is treated as 1".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            warnings.push(ConfigWarning {
                field: "retry.backoff_multiplier".into(),
                message: format!(
                    "multiplier {} shrinks delays between attempts",
                    self.retry.backoff_multiplier
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Use 1.0 for constant delays, 2.0 for doubling".into()),
            });
        }

        // ── Policy ───
        let valid_verdicts = ["deny", "allow"];
        if !valid_verdicts.contains(&self.policy.default_verdict.as_str()) {
            warnings.push(ConfigWarning {
                field: "policy.default_verdict".into(),
                message: format!("unknown default verdict '{}'", self.policy.default_verdict),
                severity: WarningSeverity::Error,
                hint: Some("Valid values: deny, allow".into()),
            });
        } else if self.policy.default_verdict == "allow" {
            warnings.push(ConfigWarning {
                field: "policy.default_verdict".into(),
                message: "default verdict is allow — steps no rule matches will execute".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Keep 'deny' unless every tool in the registry is trusted".into()),
            });
        }
        if let Some(threshold) = self.policy.risk_threshold {
            if threshold > 10 {
                warnings.push(ConfigWarning {
                    field: "policy.risk_threshold".into(),
                    message: format!("threshold {} is above the 0-10 risk scale", threshold),
                    severity: WarningSeverity::Warning,
                    hint: Some("Risk levels range 0-10; a threshold above 10 never escalates".into()),
                });
            }
        }

        // ── HITL ───
        if self.hitl.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "hitl.timeout_secs".into(),
                message: "timeout is 0 — every escalation is denied immediately".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. 120".into()),
            });
        }

        // ── Logging ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Driver ───
        if self.driver.interval_secs == 0 {
            warnings.push(ConfigWarning {
                field: "driver.interval_secs".into(),
                message: "interval is 0 — loop rounds run back to back".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. 300 for a five-minute cadence".into()),
            });
        }

        // ── Planner rules ───
        for (i, rule) in self.planner.rules.iter().enumerate() {
            if rule.trigger.trim().is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("planner.rules[{}].trigger", i),
                    message: format!("rule '{}' has an empty trigger", rule.name),
                    severity: WarningSeverity::Warning,
                    hint: Some("An empty trigger matches every objective".into()),
                });
            }
            if rule.steps.is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("planner.rules[{}].steps", i),
                    message: format!("rule '{}' has no steps", rule.name),
                    severity: WarningSeverity::Warning,
                    hint: None,
                });
            }
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
