use async_trait::async_trait;

use drover_core::{Directive, MemoryRecord, Task, ToolResult};

/// Trait implemented by each planner (rule table, script, external backend).
///
/// The orchestrator calls `next_plan` once per loop iteration, passing the
/// task, a view of the memory trace so far, and the tool results from the
/// previous iteration. The implementation decides whether more work is
/// needed ([`Directive::Plan`]) or the objective is met
/// ([`Directive::Done`]).
///
/// The call runs under a caller-enforced timeout; implementations do not
/// need their own. Reference implementations must be deterministic given
/// identical inputs so traces stay auditable.
#[async_trait]
pub trait Brain: Send + Sync {
    /// Human-readable name, e.g. "rules", "scripted".
    fn name(&self) -> &str;

    /// Produce the next directive for the task.
    async fn next_plan(
        &self,
        task: &Task,
        memory: &[MemoryRecord],
        last_observations: &[ToolResult],
    ) -> drover_core::Result<Directive>;
}
