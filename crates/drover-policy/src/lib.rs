//! # drover-policy
//!
//! The safety layer in front of tool execution: a rule-based policy engine
//! with explicit precedence and a fail-closed default, run budgets (iteration
//! cap and wall-clock deadline), and the human-in-the-loop approval gate used
//! when a rule escalates.

pub mod approval;
pub mod budget;
pub mod rules;

pub use approval::{ApprovalGate, HitlAnswer, HitlDecision, HitlRequest, HitlResponse, PendingRequest};
pub use budget::{BudgetSnapshot, RunBudget};
pub use rules::{
    AllowlistRule, ArgumentPatternRule, DenylistRule, MutatingToolRule, PolicyContext,
    PolicyDecision, PolicyEngine, PolicyRule, PolicyVerdict, RiskThresholdRule, RuleOutcome,
};
