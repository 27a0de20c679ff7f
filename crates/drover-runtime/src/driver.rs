use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use drover_core::{Event, RunReport, Task};

use crate::orchestrator::Orchestrator;

/// Repeats a task on a fixed interval for unattended operation.
///
/// Each round gets a fresh task id, so every run writes its own trace.
/// Stops when cancelled, when `max_runs` rounds have completed, or when a
/// round ends in a contract violation (which would only repeat).
pub struct RunDriver {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    max_runs: Option<u32>,
}

impl RunDriver {
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration, max_runs: Option<u32>) -> Self {
        Self {
            orchestrator,
            interval,
            max_runs,
        }
    }

    pub async fn run(&self, template: &Task, cancel: CancellationToken) -> Vec<RunReport> {
        let mut reports = Vec::new();
        let mut completed: u32 = 0;

        info!(
            interval_secs = self.interval.as_secs(),
            max_runs = ?self.max_runs,
            objective = %template.objective,
            "run driver started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.orchestrator.events().publish(Event::Heartbeat {
                timestamp: Utc::now(),
            });

            let task = Task {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                ..template.clone()
            };

            match self
                .orchestrator
                .run_cancellable(task, cancel.child_token())
                .await
            {
                Ok(report) => {
                    info!(
                        round = completed + 1,
                        status = %report.status,
                        steps = report.steps_executed,
                        "driver round finished"
                    );
                    reports.push(report);
                }
                Err(e) => {
                    warn!(error = %e, "driver round hit a contract violation; stopping");
                    break;
                }
            }

            completed += 1;
            if let Some(max) = self.max_runs {
                if completed >= max {
                    info!(completed, "run driver reached max runs");
                    break;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        reports
    }
}
