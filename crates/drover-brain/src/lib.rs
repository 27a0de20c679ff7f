//! # drover-brain
//!
//! The planning seam. [`Brain`] is the trait the orchestrator calls at the
//! top of every loop iteration; what sits behind it — a rule table, a test
//! script, or an external reasoning backend — is the implementor's business.
//!
//! Ships two implementations:
//!
//! - [`RuleBrain`] — deterministic trigger→steps planner, the reference
//!   implementation used by the CLI when no other brain is wired in.
//! - [`ScriptedBrain`] — queue of canned directives with call recording,
//!   for tests.

pub mod brain;
pub mod rule_based;
pub mod scripted;

pub use brain::Brain;
pub use rule_based::{PlannerRule, RuleBrain, StepTemplate};
pub use scripted::ScriptedBrain;
