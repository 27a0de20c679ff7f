use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Tracks what one run has consumed against its limits: plan iterations and
/// the optional wall-clock deadline.
///
/// Exceeding a limit is a designed terminal condition, surfaced as
/// `BudgetExceeded` so the loop can fail the run cleanly.
#[derive(Debug, Clone)]
pub struct RunBudget {
    state: Arc<RwLock<BudgetSnapshot>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    /// Plan iterations completed or in progress.
    pub iterations: u32,
    /// Hard cap on plan iterations.
    pub max_steps: u32,
    /// Steps that reached a tool handler.
    pub steps_executed: u32,
    /// Wall-clock deadline, when the task set one.
    pub deadline: Option<DateTime<Utc>>,
}

impl RunBudget {
    pub fn new(max_steps: u32, deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            state: Arc::new(RwLock::new(BudgetSnapshot {
                iterations: 0,
                max_steps,
                steps_executed: 0,
                deadline,
            })),
        }
    }

    /// Begin a plan iteration. Errs with `BudgetExceeded` when the iteration
    /// cap is already spent or the deadline has passed; otherwise counts the
    /// iteration and returns its 1-based number.
    pub fn begin_iteration(&self) -> drover_core::Result<u32> {
        let mut state = self.state.write();

        if let Some(deadline) = state.deadline {
            let now = Utc::now();
            if now >= deadline {
                warn!(%deadline, "run deadline passed");
                return Err(drover_core::DroverError::BudgetExceeded {
                    resource: "deadline".into(),
                    used: now.timestamp() as f64,
                    limit: deadline.timestamp() as f64,
                });
            }
        }

        if state.iterations >= state.max_steps {
            return Err(drover_core::DroverError::BudgetExceeded {
                resource: "iterations".into(),
                used: state.iterations as f64,
                limit: state.max_steps as f64,
            });
        }

        state.iterations += 1;
        Ok(state.iterations)
    }

    /// Count a step that reached a tool handler (retries count once).
    pub fn record_step(&self) {
        self.state.write().steps_executed += 1;
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        self.state.read().clone()
    }
}
