//! Scripted brain for deterministic testing.
//!
//! Returns pre-queued directives without any reasoning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use drover_core::{Directive, DroverError, MemoryRecord, Plan, Step, Task, ToolResult};

use crate::brain::Brain;

#[derive(Clone)]
enum ScriptEntry {
    Plan(Vec<Step>),
    Done(String),
    Fail(String),
}

/// What one planning call saw, captured for assertions in tests.
#[derive(Debug, Clone)]
pub struct PlanningCall {
    pub memory_records: usize,
    pub observations: Vec<ToolResult>,
}

/// A brain that replays a queue of canned directives.
///
/// # Example
/// ```
/// use drover_brain::ScriptedBrain;
/// use drover_core::Step;
/// use serde_json::json;
///
/// let brain = ScriptedBrain::new()
///     .with_plan(vec![Step::new("echo", json!({"text": "hi"}))])
///     .with_done("finished");
/// ```
pub struct ScriptedBrain {
    entries: Arc<Mutex<Vec<ScriptEntry>>>,
    /// Track all planning calls received (for assertions in tests).
    calls: Arc<Mutex<Vec<PlanningCall>>>,
    /// When the queue runs dry: replay the last entry instead of `Done`.
    repeat_last: bool,
    /// Artificial latency before answering, for timeout tests.
    delay: Option<Duration>,
}

impl Default for ScriptedBrain {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBrain {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(vec![])),
            calls: Arc::new(Mutex::new(vec![])),
            repeat_last: false,
            delay: None,
        }
    }

    /// Queue a plan built from these steps.
    pub fn with_plan(self, steps: Vec<Step>) -> Self {
        self.entries.lock().push(ScriptEntry::Plan(steps));
        self
    }

    /// Queue a `Done` directive.
    pub fn with_done(self, summary: &str) -> Self {
        self.entries.lock().push(ScriptEntry::Done(summary.to_string()));
        self
    }

    /// Queue a planning failure.
    pub fn with_failure(self, message: &str) -> Self {
        self.entries.lock().push(ScriptEntry::Fail(message.to_string()));
        self
    }

    /// Replay the final entry forever once the queue is exhausted.
    pub fn repeating_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Sleep this long before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All planning calls made so far.
    pub fn recorded_calls(&self) -> Vec<PlanningCall> {
        self.calls.lock().clone()
    }

    fn next_entry(&self) -> ScriptEntry {
        let mut entries = self.entries.lock();
        if entries.is_empty() {
            return ScriptEntry::Done("script exhausted".to_string());
        }
        if self.repeat_last && entries.len() == 1 {
            return entries[0].clone();
        }
        entries.remove(0)
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn next_plan(
        &self,
        task: &Task,
        memory: &[MemoryRecord],
        last_observations: &[ToolResult],
    ) -> drover_core::Result<Directive> {
        self.calls.lock().push(PlanningCall {
            memory_records: memory.len(),
            observations: last_observations.to_vec(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_entry() {
            ScriptEntry::Plan(steps) => Ok(Directive::Plan(Plan::new(
                task.id,
                steps,
                "scripted plan",
            ))),
            ScriptEntry::Done(summary) => Ok(Directive::Done { summary }),
            ScriptEntry::Fail(message) => Err(DroverError::Planning(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> Task {
        Task::new("test objective")
    }

    #[tokio::test]
    async fn test_plays_entries_in_order() {
        let brain = ScriptedBrain::new()
            .with_plan(vec![Step::new("echo", json!({}))])
            .with_done("all set");

        match brain.next_plan(&task(), &[], &[]).await.unwrap() {
            Directive::Plan(plan) => assert_eq!(plan.steps[0].tool, "echo"),
            other => panic!("expected Plan, got {other:?}"),
        }
        match brain.next_plan(&task(), &[], &[]).await.unwrap() {
            Directive::Done { summary } => assert_eq!(summary, "all set"),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_script_is_done() {
        let brain = ScriptedBrain::new();
        match brain.next_plan(&task(), &[], &[]).await.unwrap() {
            Directive::Done { summary } => assert_eq!(summary, "script exhausted"),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeat_last_replays_final_entry() {
        let brain = ScriptedBrain::new()
            .with_plan(vec![Step::new("echo", json!({}))])
            .repeating_last();

        for _ in 0..3 {
            match brain.next_plan(&task(), &[], &[]).await.unwrap() {
                Directive::Plan(_) => {}
                other => panic!("expected Plan, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_queued_failure() {
        let brain = ScriptedBrain::new().with_failure("backend unreachable");
        let err = brain.next_plan(&task(), &[], &[]).await.unwrap_err();
        match err {
            DroverError::Planning(msg) => assert_eq!(msg, "backend unreachable"),
            other => panic!("expected Planning, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_records_calls() {
        let brain = ScriptedBrain::new().with_done("ok");
        let _ = brain.next_plan(&task(), &[], &[]).await;
        let calls = brain.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].memory_records, 0);
    }
}
