use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use drover_brain::Brain;
use drover_core::{
    Directive, DroverError, Event, EventBus, Phase, RecordFilter, RecordKind, RunReport,
    RunStatus, Task, ToolResult, TraceRef,
};
use drover_memory::MemoryStore;
use drover_policy::{
    ApprovalGate, HitlRequest, PolicyContext, PolicyEngine, PolicyVerdict, RunBudget,
};

use crate::registry::ToolRegistry;

/// Backoff schedule for retrying idempotent steps after transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per step, first try included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given how many retries are already
    /// spent. Grows as `base × multiplier^retries`, capped at `max_delay`.
    pub fn delay_for(&self, retries_used: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        if base_ms <= 0.0 {
            return Duration::ZERO;
        }
        let max_ms = (self.max_delay.as_millis() as f64).max(base_ms);
        let factor = self.backoff_multiplier.max(1.0).powi(retries_used.min(20) as i32);
        Duration::from_millis((base_ms * factor).min(max_ms) as u64)
    }
}

/// Loop-level knobs for one orchestrator instance.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Hard cap on plan iterations per run. A task's own `max_steps`
    /// overrides this.
    pub max_steps: u32,
    /// Timeout for a single planning call.
    pub planning_timeout: Duration,
    /// Planning retries after the first failed attempt before the run fails.
    pub planning_retries: u32,
    /// Timeout for a single tool invocation attempt.
    pub step_timeout: Duration,
    /// How long an escalated step waits for a human before the gate denies.
    pub hitl_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            planning_timeout: Duration::from_secs(30),
            planning_retries: 2,
            step_timeout: Duration::from_secs(60),
            hitl_timeout: Duration::from_secs(120),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// The control loop.
///
/// One orchestrator serves many tasks; each `run` call drives one task
/// through plan–act–observe with its own isolated loop state. Collaborators
/// (registry, store, policy, gate) are shared and must tolerate concurrent
/// runs — which they do, by construction.
///
/// Every consequential moment of a run lands in the memory trace, in causal
/// order: the plan, each policy decision, each approval exchange, and each
/// invocation attempt. A failed trace write aborts the run — an audit trail
/// with holes is worse than no run at all.
pub struct Orchestrator {
    brain: Arc<dyn Brain>,
    registry: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryStore>,
    policy: Arc<PolicyEngine>,
    gate: Arc<ApprovalGate>,
    events: EventBus,
    config: RunConfig,
}

impl Orchestrator {
    pub fn new(
        brain: Arc<dyn Brain>,
        registry: Arc<ToolRegistry>,
        memory: Arc<dyn MemoryStore>,
        policy: Arc<PolicyEngine>,
        gate: Arc<ApprovalGate>,
        events: EventBus,
        config: RunConfig,
    ) -> Self {
        Self {
            brain,
            registry,
            memory,
            policy,
            gate,
            events,
            config,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn approval_gate(&self) -> &Arc<ApprovalGate> {
        &self.gate
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a task to a terminal state.
    ///
    /// Returns `Ok` with a report for every orderly ending, including
    /// `Failed` and `Aborted`. Returns `Err` only for contract violations:
    /// a malformed task, or a plan naming a tool that was never registered.
    pub async fn run(&self, task: Task) -> drover_core::Result<RunReport> {
        self.run_cancellable(task, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but honoring a cancellation token at safe
    /// checkpoints: between iterations, between steps, and while suspended
    /// on planning or approval. Never mid-invocation — an in-flight tool
    /// resolves and is observed before the run aborts.
    pub async fn run_cancellable(
        &self,
        task: Task,
        cancel: CancellationToken,
    ) -> drover_core::Result<RunReport> {
        task.validate()?;

        let started_at = Utc::now();
        let budget = RunBudget::new(
            task.max_steps.unwrap_or(self.config.max_steps),
            task.deadline,
        );

        info!(task_id = %task.id, objective = %task.objective, "run started");
        self.events.publish(Event::TaskStarted {
            task_id: task.id,
            objective: task.objective.clone(),
        });

        let mut all_observations: Vec<ToolResult> = Vec::new();
        let mut last_observations: Vec<ToolResult> = Vec::new();

        let (status, reason) = 'run: loop {
            if cancel.is_cancelled() {
                break 'run (RunStatus::Aborted, "cancelled".to_string());
            }

            let iteration = match budget.begin_iteration() {
                Ok(n) => n,
                Err(e) => break 'run (RunStatus::Failed, e.to_string()),
            };

            self.set_phase(&task, Phase::Planning);

            let memory_view = match self.memory.query(task.id, &RecordFilter::default()) {
                Ok(records) => records,
                Err(e) => {
                    break 'run (RunStatus::Failed, format!("memory unavailable: {e}"));
                }
            };

            // ── PLANNING ───────────────────────────────────────

            let mut directive: Option<Directive> = None;
            let mut last_planning_error = String::new();
            for attempt in 1..=self.config.planning_retries + 1 {
                let planned = tokio::select! {
                    _ = cancel.cancelled() => {
                        break 'run (RunStatus::Aborted, "cancelled during planning".to_string());
                    }
                    outcome = tokio::time::timeout(
                        self.config.planning_timeout,
                        self.brain.next_plan(&task, &memory_view, &last_observations),
                    ) => outcome,
                };

                let error = match planned {
                    Ok(Ok(Directive::Plan(plan))) if plan.is_empty() => {
                        "brain produced an empty plan".to_string()
                    }
                    Ok(Ok(d)) => {
                        directive = Some(d);
                        break;
                    }
                    Ok(Err(DroverError::Planning(msg))) => msg,
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => DroverError::PlanningTimeout {
                        seconds: self.config.planning_timeout.as_secs(),
                    }
                    .to_string(),
                };

                warn!(task_id = %task.id, attempt, %error, "planning attempt failed");
                self.events.publish(Event::PlanningFailed {
                    task_id: task.id,
                    attempt,
                    error: error.clone(),
                });
                last_planning_error = error;
            }

            let Some(directive) = directive else {
                break 'run (
                    RunStatus::Failed,
                    format!("planning failed: {last_planning_error}"),
                );
            };

            let plan = match directive {
                Directive::Done { summary } => {
                    if let Err(e) =
                        self.record(&task, RecordKind::Plan, &Directive::done(summary.clone()))
                    {
                        break 'run (RunStatus::Failed, e.to_string());
                    }
                    break 'run (RunStatus::Done, summary);
                }
                Directive::Plan(plan) => plan,
            };

            if let Err(e) = self.record(&task, RecordKind::Plan, &Directive::Plan(plan.clone())) {
                break 'run (RunStatus::Failed, e.to_string());
            }
            self.events.publish(Event::PlanProduced {
                task_id: task.id,
                plan_id: plan.id,
                steps: plan.steps.len(),
            });

            // ── Step loop: EVALUATING → (EXECUTING | AWAITING_HUMAN) ──

            let mut iteration_results: Vec<ToolResult> = Vec::new();
            for step in &plan.steps {
                if cancel.is_cancelled() {
                    break 'run (RunStatus::Aborted, "cancelled".to_string());
                }

                self.set_phase(&task, Phase::Evaluating);

                // A plan naming an unregistered tool is a contract
                // violation, not a recoverable observation.
                let Some(spec) = self.registry.spec(&step.tool) else {
                    return Err(DroverError::UnknownTool(step.tool.clone()));
                };
                let tool_idempotent = spec.idempotent;

                let ctx = PolicyContext {
                    tool: spec,
                    iteration,
                    steps_executed: budget.snapshot().steps_executed,
                };
                let decision = self.policy.evaluate(step, &task, &ctx);
                if let Err(e) = self.record(&task, RecordKind::Decision, &decision) {
                    break 'run (RunStatus::Failed, e.to_string());
                }

                match decision.verdict {
                    PolicyVerdict::Deny => {
                        self.events.publish(Event::StepDenied {
                            task_id: task.id,
                            step_id: step.id,
                            rule_id: decision.rule_id.clone(),
                            reason: decision.reason.clone(),
                        });
                        // Denied: no ToolResult, cursor advances.
                        continue;
                    }
                    PolicyVerdict::Escalate => {
                        self.set_phase(&task, Phase::AwaitingHuman);
                        let request = HitlRequest {
                            id: Uuid::new_v4(),
                            task_id: task.id,
                            step_id: step.id,
                            tool: step.tool.clone(),
                            arguments: step.arguments.clone(),
                            reason: decision.reason.clone(),
                            objective: task.objective.clone(),
                            iteration,
                            requested_at: Utc::now(),
                        };
                        if let Err(e) = self.record(&task, RecordKind::Hitl, &request) {
                            break 'run (RunStatus::Failed, e.to_string());
                        }
                        self.events.publish(Event::StepEscalated {
                            task_id: task.id,
                            step_id: step.id,
                            reason: decision.reason.clone(),
                        });

                        let response = tokio::select! {
                            _ = cancel.cancelled() => {
                                break 'run (
                                    RunStatus::Aborted,
                                    "cancelled while awaiting approval".to_string(),
                                );
                            }
                            response = self.gate.request_approval(
                                request,
                                self.config.hitl_timeout,
                            ) => response,
                        };

                        if let Err(e) = self.record(&task, RecordKind::Hitl, &response) {
                            break 'run (RunStatus::Failed, e.to_string());
                        }
                        self.events.publish(Event::ApprovalResolved {
                            task_id: task.id,
                            step_id: step.id,
                            approved: response.approved(),
                            timed_out: response.timed_out,
                        });

                        let resolved = if response.approved() {
                            decision.resolved(PolicyVerdict::Allow, "approved by human responder")
                        } else if response.timed_out {
                            decision
                                .resolved(PolicyVerdict::Deny, "approval request timed out")
                        } else {
                            decision.resolved(PolicyVerdict::Deny, "denied by human responder")
                        };
                        if let Err(e) = self.record(&task, RecordKind::Decision, &resolved) {
                            break 'run (RunStatus::Failed, e.to_string());
                        }

                        if resolved.verdict != PolicyVerdict::Allow {
                            self.events.publish(Event::StepDenied {
                                task_id: task.id,
                                step_id: step.id,
                                rule_id: resolved.rule_id.clone(),
                                reason: resolved.reason.clone(),
                            });
                            continue;
                        }
                    }
                    PolicyVerdict::Allow => {}
                }

                // ── EXECUTING ──────────────────────────────────

                self.set_phase(&task, Phase::Executing);

                // Bad arguments are deterministic: fail once, never retry,
                // never reach the handler.
                if let Err(e) = self.registry.validate_arguments(&step.tool, &step.arguments) {
                    let result = ToolResult::failure(step.id, &step.tool, e.to_string(), 0, 1);
                    if let Err(e) = self.record(&task, RecordKind::Result, &result) {
                        break 'run (RunStatus::Failed, e.to_string());
                    }
                    self.events.publish(Event::StepExecuted {
                        task_id: task.id,
                        step_id: step.id,
                        tool: step.tool.clone(),
                        status: result.status,
                        attempt: 1,
                    });
                    iteration_results.push(result);
                    self.set_phase(&task, Phase::Observing);
                    continue;
                }

                budget.record_step();
                let retryable = step.idempotent && tool_idempotent;
                let max_attempts = if retryable {
                    self.config.retry_policy.max_attempts.max(1)
                } else {
                    1
                };

                let mut final_result: Option<ToolResult> = None;
                for attempt in 1..=max_attempts {
                    let result = self
                        .registry
                        .invoke(step, attempt, self.config.step_timeout)
                        .await?;
                    if let Err(e) = self.record(&task, RecordKind::Result, &result) {
                        break 'run (RunStatus::Failed, e.to_string());
                    }
                    self.events.publish(Event::StepExecuted {
                        task_id: task.id,
                        step_id: step.id,
                        tool: step.tool.clone(),
                        status: result.status,
                        attempt,
                    });

                    let succeeded = result.is_success();
                    let exhausted = attempt == max_attempts;
                    final_result = Some(result);
                    if succeeded || exhausted {
                        break;
                    }

                    let delay = self.config.retry_policy.delay_for(attempt - 1);
                    debug!(
                        tool = %step.tool,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying idempotent step after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }

                if let Some(result) = final_result {
                    iteration_results.push(result);
                }

                self.set_phase(&task, Phase::Observing);
            }

            last_observations = iteration_results.clone();
            all_observations.extend(iteration_results);
        };

        let terminal = match status {
            RunStatus::Done => Phase::Done,
            RunStatus::Failed => Phase::Failed,
            RunStatus::Aborted => Phase::Aborted,
        };
        self.set_phase(&task, terminal);
        self.events.publish(Event::TaskFinished {
            task_id: task.id,
            status,
            reason: reason.clone(),
        });
        info!(task_id = %task.id, %status, %reason, "run finished");

        let snapshot = budget.snapshot();
        Ok(RunReport {
            task_id: task.id,
            status,
            reason,
            final_observations: all_observations,
            trace: TraceRef {
                task_id: task.id,
                last_seq: self.memory.last_seq(task.id).unwrap_or(0),
            },
            iterations: snapshot.iterations,
            steps_executed: snapshot.steps_executed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn record<T: Serialize>(
        &self,
        task: &Task,
        kind: RecordKind,
        value: &T,
    ) -> drover_core::Result<u64> {
        let payload = serde_json::to_value(value)?;
        self.memory.append(task.id, kind, &payload)
    }

    fn set_phase(&self, task: &Task, phase: Phase) {
        debug!(task_id = %task.id, %phase, "phase change");
        self.events.publish(Event::PhaseChanged {
            task_id: task.id,
            phase,
        });
    }
}
