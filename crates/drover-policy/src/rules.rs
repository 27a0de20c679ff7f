use drover_core::{Step, Task, ToolSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Final verdict attached to a step's policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVerdict {
    Allow,
    Deny,
    Escalate,
}

impl std::fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyVerdict::Allow => f.write_str("allow"),
            PolicyVerdict::Deny => f.write_str("deny"),
            PolicyVerdict::Escalate => f.write_str("escalate"),
        }
    }
}

/// What a single matching rule says about a step.
#[derive(Debug, Clone)]
pub enum RuleOutcome {
    /// Step may proceed — subject to later deny/escalate matches.
    Allow,
    /// Step is blocked — provide reason.
    Deny(String),
    /// Step needs human approval — provide reason.
    Escalate(String),
}

/// The recorded outcome of evaluating policy for one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub step_id: Uuid,
    pub verdict: PolicyVerdict,
    pub reason: String,
    /// Which rule produced the verdict ("default" when none matched).
    pub rule_id: String,
}

impl PolicyDecision {
    /// Rewrite an escalation to its post-HITL resolution, preserving the
    /// originating rule for the audit trail.
    pub fn resolved(mut self, verdict: PolicyVerdict, reason: impl Into<String>) -> Self {
        self.verdict = verdict;
        self.reason = reason.into();
        self
    }
}

/// Read-only view handed to rules alongside the step and task.
#[derive(Debug, Clone)]
pub struct PolicyContext {
    /// Descriptor of the tool the step wants to invoke.
    pub tool: ToolSpec,
    /// Current plan iteration (1-based).
    pub iteration: u32,
    /// Steps executed so far in this run.
    pub steps_executed: u32,
}

/// A single policy rule.
///
/// `evaluate` must be pure: same inputs, same outcome, no side effects.
/// Returning `None` means the rule does not apply to this step.
pub trait PolicyRule: Send + Sync {
    /// Stable identifier recorded on decisions this rule produces.
    fn id(&self) -> &str;

    /// Higher-priority rules are consulted first; ties are broken by
    /// registration order.
    fn priority(&self) -> u32 {
        50
    }

    fn evaluate(&self, step: &Step, task: &Task, ctx: &PolicyContext) -> Option<RuleOutcome>;
}

/// Applies registered rules to a step in priority-then-registration order.
///
/// The first matching deny or escalate wins immediately. A matching allow is
/// remembered but evaluation continues, so a lower-priority deny still
/// blocks. When nothing matches, the configured default verdict applies —
/// deny unless explicitly configured otherwise.
pub struct PolicyEngine {
    rules: Vec<Box<dyn PolicyRule>>,
    default_verdict: PolicyVerdict,
}

impl PolicyEngine {
    pub fn new(default_verdict: PolicyVerdict) -> Self {
        Self {
            rules: Vec::new(),
            default_verdict,
        }
    }

    /// Deny-by-default engine with no rules.
    pub fn fail_closed() -> Self {
        Self::new(PolicyVerdict::Deny)
    }

    pub fn default_verdict(&self) -> PolicyVerdict {
        self.default_verdict
    }

    /// Register a rule. Insertion keeps the evaluation order total:
    /// descending priority, registration order within equal priorities.
    pub fn add_rule(&mut self, rule: Box<dyn PolicyRule>) {
        let pos = self
            .rules
            .iter()
            .position(|existing| existing.priority() < rule.priority())
            .unwrap_or(self.rules.len());
        self.rules.insert(pos, rule);
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.id().to_string()).collect()
    }

    /// Evaluate a step. Pure: no engine state changes, decisions depend only
    /// on the step, task, and context.
    pub fn evaluate(&self, step: &Step, task: &Task, ctx: &PolicyContext) -> PolicyDecision {
        let mut allowed_by: Option<&str> = None;

        for rule in &self.rules {
            match rule.evaluate(step, task, ctx) {
                None => continue,
                Some(RuleOutcome::Allow) => {
                    allowed_by.get_or_insert(rule.id());
                }
                Some(RuleOutcome::Deny(reason)) => {
                    warn!(
                        rule = rule.id(),
                        step_id = %step.id,
                        tool = %step.tool,
                        %reason,
                        "policy denied step"
                    );
                    return PolicyDecision {
                        step_id: step.id,
                        verdict: PolicyVerdict::Deny,
                        reason,
                        rule_id: rule.id().to_string(),
                    };
                }
                Some(RuleOutcome::Escalate(reason)) => {
                    info!(
                        rule = rule.id(),
                        step_id = %step.id,
                        tool = %step.tool,
                        %reason,
                        "policy escalated step for approval"
                    );
                    return PolicyDecision {
                        step_id: step.id,
                        verdict: PolicyVerdict::Escalate,
                        reason,
                        rule_id: rule.id().to_string(),
                    };
                }
            }
        }

        if let Some(rule_id) = allowed_by {
            return PolicyDecision {
                step_id: step.id,
                verdict: PolicyVerdict::Allow,
                reason: format!("allowed by rule '{rule_id}'"),
                rule_id: rule_id.to_string(),
            };
        }

        PolicyDecision {
            step_id: step.id,
            verdict: self.default_verdict,
            reason: format!("no rule matched; default verdict is {}", self.default_verdict),
            rule_id: "default".to_string(),
        }
    }
}

// ── Built-in rules ─────────────────────────────────────────────

/// Denies any step naming a listed tool.
pub struct DenylistRule {
    tools: Vec<String>,
    priority: u32,
}

impl DenylistRule {
    pub fn new(tools: Vec<String>) -> Self {
        Self {
            tools,
            priority: 100,
        }
    }
}

impl PolicyRule for DenylistRule {
    fn id(&self) -> &str {
        "tool_denylist"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, step: &Step, _task: &Task, _ctx: &PolicyContext) -> Option<RuleOutcome> {
        if self.tools.iter().any(|t| t == &step.tool) {
            return Some(RuleOutcome::Deny(format!(
                "tool '{}' is on the denylist",
                step.tool
            )));
        }
        None
    }
}

/// Allows listed tools; when the list is non-empty, unlisted tools are
/// denied (the allowlist is exclusive once configured).
pub struct AllowlistRule {
    tools: Vec<String>,
    priority: u32,
}

impl AllowlistRule {
    pub fn new(tools: Vec<String>) -> Self {
        Self { tools, priority: 90 }
    }
}

impl PolicyRule for AllowlistRule {
    fn id(&self) -> &str {
        "tool_allowlist"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, step: &Step, _task: &Task, _ctx: &PolicyContext) -> Option<RuleOutcome> {
        if self.tools.is_empty() {
            return None;
        }
        if self.tools.iter().any(|t| t == &step.tool) {
            Some(RuleOutcome::Allow)
        } else {
            Some(RuleOutcome::Deny(format!(
                "tool '{}' is not on the allowlist",
                step.tool
            )))
        }
    }
}

/// Escalates steps whose tool declares a risk level above the threshold.
pub struct RiskThresholdRule {
    threshold: u8,
    priority: u32,
}

impl RiskThresholdRule {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            priority: 80,
        }
    }
}

impl PolicyRule for RiskThresholdRule {
    fn id(&self) -> &str {
        "risk_threshold"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, step: &Step, _task: &Task, ctx: &PolicyContext) -> Option<RuleOutcome> {
        if ctx.tool.risk_level > self.threshold {
            return Some(RuleOutcome::Escalate(format!(
                "tool '{}' has risk level {} which exceeds threshold {}",
                step.tool, ctx.tool.risk_level, self.threshold
            )));
        }
        None
    }
}

/// Escalates any step whose tool declares side-effects.
pub struct MutatingToolRule {
    priority: u32,
}

impl MutatingToolRule {
    pub fn new() -> Self {
        Self { priority: 70 }
    }
}

impl Default for MutatingToolRule {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRule for MutatingToolRule {
    fn id(&self) -> &str {
        "mutating_tool"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, step: &Step, _task: &Task, ctx: &PolicyContext) -> Option<RuleOutcome> {
        if ctx.tool.mutating {
            return Some(RuleOutcome::Escalate(format!(
                "tool '{}' mutates external state",
                step.tool
            )));
        }
        None
    }
}

/// Denies steps whose serialized arguments match any configured pattern.
pub struct ArgumentPatternRule {
    patterns: Vec<Regex>,
    priority: u32,
}

impl ArgumentPatternRule {
    /// Compiles the given patterns; invalid ones are rejected up front so a
    /// misconfigured rule can never silently pass everything.
    pub fn new(patterns: &[String]) -> drover_core::Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    drover_core::DroverError::Config(format!("invalid deny pattern '{p}': {e}"))
                })
            })
            .collect::<drover_core::Result<Vec<_>>>()?;
        Ok(Self {
            patterns: compiled,
            priority: 95,
        })
    }
}

impl PolicyRule for ArgumentPatternRule {
    fn id(&self) -> &str {
        "argument_pattern"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn evaluate(&self, step: &Step, _task: &Task, _ctx: &PolicyContext) -> Option<RuleOutcome> {
        let serialized = step.arguments.to_string();
        for pattern in &self.patterns {
            if pattern.is_match(&serialized) {
                return Some(RuleOutcome::Deny(format!(
                    "arguments match denied pattern '{}'",
                    pattern.as_str()
                )));
            }
        }
        None
    }
}
