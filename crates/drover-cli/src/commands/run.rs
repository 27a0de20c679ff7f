use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use drover_brain::{PlannerRule, RuleBrain, StepTemplate};
use drover_config::DroverConfig;
use drover_core::{Event, EventBus, RunReport, RunStatus, Task, ToolStatus};
use drover_policy::{
    AllowlistRule, ApprovalGate, ArgumentPatternRule, DenylistRule, HitlAnswer, HitlDecision,
    HitlRequest, MutatingToolRule, PolicyEngine, PolicyVerdict, RiskThresholdRule,
};
use drover_runtime::{
    Orchestrator, RetryPolicy, RunConfig, RunDriver, ToolRegistry, register_builtins,
};

use super::truncate_output;

/// How escalated steps get answered when nobody sits at the terminal.
#[derive(Clone, Copy)]
pub(super) enum ApprovalMode {
    Prompt,
    ApproveAll,
    DenyAll,
}

impl ApprovalMode {
    pub(super) fn from_flags(approve_all: bool, deny_all: bool) -> Self {
        if approve_all {
            Self::ApproveAll
        } else if deny_all {
            Self::DenyAll
        } else {
            Self::Prompt
        }
    }
}

pub(super) async fn cmd_run(
    config: DroverConfig,
    objective: String,
    max_steps: Option<u32>,
    deadline_secs: Option<u64>,
    constraints: Vec<String>,
    mode: ApprovalMode,
    in_memory: bool,
    json: bool,
) -> drover_core::Result<()> {
    let orchestrator = build_orchestrator(&config, in_memory, mode)?;

    let mut task = Task::new(objective);
    for constraint in constraints {
        task = task.with_constraint(constraint);
    }
    if let Some(max_steps) = max_steps {
        task = task.with_max_steps(max_steps);
    }
    if let Some(secs) = deadline_secs {
        task = task.with_deadline(Utc::now() + chrono::Duration::seconds(secs as i64));
    }

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    if json {
        let report = orchestrator.run_cancellable(task, cancel).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🐏 Drover v{}", env!("CARGO_PKG_VERSION"));
    println!("   Task: {}", task.id);
    println!("   Objective: {}", task.objective);
    println!();

    let mut events = orchestrator.events().subscribe();
    let run = orchestrator.run_cancellable(task, cancel);
    tokio::pin!(run);

    let report = loop {
        tokio::select! {
            result = &mut run => break result?,
            event = events.recv() => {
                if let Ok(event) = event {
                    print_event(&event);
                }
            }
        }
    };
    // Events published between the last poll and run completion
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }

    print_report(&report);
    Ok(())
}

pub(super) async fn cmd_loop(
    config: DroverConfig,
    objective: String,
    interval: Option<u64>,
    max_runs: Option<u32>,
    mode: ApprovalMode,
    in_memory: bool,
) -> drover_core::Result<()> {
    let orchestrator = build_orchestrator(&config, in_memory, mode)?;

    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.driver.interval());
    let max_runs = max_runs.or(config.driver.max_runs);

    let template = Task::new(objective);
    println!("🐏 Drover v{} — loop mode", env!("CARGO_PKG_VERSION"));
    println!("   Objective: {}", template.objective);
    println!(
        "   Interval: {}s{}",
        interval.as_secs(),
        max_runs
            .map(|n| format!(", stopping after {n} round(s)"))
            .unwrap_or_default()
    );
    println!();

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let driver = RunDriver::new(orchestrator, interval, max_runs);
    let reports = driver.run(&template, cancel).await;

    println!();
    println!("\x1b[1m{} round(s) completed\x1b[0m", reports.len());
    for report in &reports {
        let icon = match report.status {
            RunStatus::Done => "✅",
            RunStatus::Failed => "❌",
            RunStatus::Aborted => "⏹ ",
        };
        println!(
            "  {icon} {}  {} — {}",
            report.task_id, report.status, report.reason
        );
    }
    Ok(())
}

/// Wire a full orchestrator from config: built-in tools, config-derived
/// policy rules, the rule-based reference brain, and the trace store.
fn build_orchestrator(
    config: &DroverConfig,
    in_memory: bool,
    mode: ApprovalMode,
) -> drover_core::Result<Arc<Orchestrator>> {
    let registry = Arc::new(ToolRegistry::new());
    register_builtins(&registry)?;

    let store = super::open_store(config, in_memory)?;
    let brain = Arc::new(RuleBrain::new(planner_rules(config)));
    let policy = Arc::new(build_policy(config)?);
    let gate = Arc::new(ApprovalGate::new());

    let run_config = RunConfig {
        max_steps: config.orchestrator.max_steps,
        planning_timeout: config.orchestrator.planning_timeout(),
        planning_retries: config.orchestrator.planning_retries,
        step_timeout: config.orchestrator.step_timeout(),
        hitl_timeout: config.hitl.timeout(),
        retry_policy: RetryPolicy {
            max_attempts: config.retry.max_attempts,
            base_delay: config.retry.base_delay(),
            backoff_multiplier: config.retry.backoff_multiplier,
            max_delay: config.retry.max_delay(),
        },
    };

    let orchestrator = Arc::new(Orchestrator::new(
        brain,
        registry,
        store,
        policy,
        gate,
        EventBus::default(),
        run_config,
    ));

    spawn_approval_listener(&orchestrator, mode);
    Ok(orchestrator)
}

fn build_policy(config: &DroverConfig) -> drover_core::Result<PolicyEngine> {
    let default_verdict = match config.policy.default_verdict.as_str() {
        "allow" => PolicyVerdict::Allow,
        _ => PolicyVerdict::Deny,
    };
    let mut engine = PolicyEngine::new(default_verdict);

    if !config.policy.denylist.is_empty() {
        engine.add_rule(Box::new(DenylistRule::new(config.policy.denylist.clone())));
    }
    if !config.policy.allowlist.is_empty() {
        engine.add_rule(Box::new(AllowlistRule::new(
            config.policy.allowlist.clone(),
        )));
    }
    if let Some(threshold) = config.policy.risk_threshold {
        engine.add_rule(Box::new(RiskThresholdRule::new(threshold)));
    }
    if config.policy.escalate_mutating {
        engine.add_rule(Box::new(MutatingToolRule::new()));
    }
    if !config.policy.denied_argument_patterns.is_empty() {
        engine.add_rule(Box::new(ArgumentPatternRule::new(
            &config.policy.denied_argument_patterns,
        )?));
    }

    Ok(engine)
}

fn planner_rules(config: &DroverConfig) -> Vec<PlannerRule> {
    config
        .planner
        .rules
        .iter()
        .map(|rule| PlannerRule {
            name: rule.name.clone(),
            trigger: rule.trigger.clone(),
            steps: rule
                .steps
                .iter()
                .map(|step| StepTemplate {
                    tool: step.tool.clone(),
                    arguments: step.arguments.clone(),
                    expected_effect: step.expected_effect.clone(),
                    idempotent: step.idempotent,
                })
                .collect(),
        })
        .collect()
}

/// Answer escalated steps: interactively via a confirm prompt, or
/// mechanically when `--approve-all`/`--deny-all` was given.
fn spawn_approval_listener(orchestrator: &Orchestrator, mode: ApprovalMode) {
    let Some(mut requests) = orchestrator.approval_gate().take_receiver() else {
        return;
    };

    tokio::spawn(async move {
        while let Some((request, responder)) = requests.recv().await {
            let answer = match mode {
                ApprovalMode::ApproveAll => HitlAnswer {
                    decision: HitlDecision::Approve,
                    responder: Some("cli:approve-all".into()),
                },
                ApprovalMode::DenyAll => HitlAnswer {
                    decision: HitlDecision::Deny,
                    responder: Some("cli:deny-all".into()),
                },
                ApprovalMode::Prompt => prompt_for_decision(&request).await,
            };
            if responder.send(answer).is_err() {
                warn!(request_id = %request.id, "approval answer arrived after the gate gave up");
            }
        }
    });
}

async fn prompt_for_decision(request: &HitlRequest) -> HitlAnswer {
    use dialoguer::{Confirm, theme::ColorfulTheme};

    println!();
    println!(
        "⏸  \x1b[1mApproval required\x1b[0m (iteration {})",
        request.iteration
    );
    println!("   Objective: {}", request.objective);
    println!("   Tool: {}", request.tool);
    println!(
        "   Arguments: {}",
        truncate_output(&request.arguments.to_string(), 120)
    );
    println!("   Reason: {}", request.reason);

    // dialoguer blocks on stdin, so keep it off the async runtime
    let tool = request.tool.clone();
    let approved = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Approve '{tool}'?"))
            .default(false)
            .interact()
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false);

    HitlAnswer {
        decision: if approved {
            HitlDecision::Approve
        } else {
            HitlDecision::Deny
        },
        responder: Some("cli:prompt".into()),
    }
}

/// First Ctrl-C requests an orderly abort at the next checkpoint; a second
/// one kills the process.
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("⏹  Stopping at the next safe checkpoint (Ctrl-C again to force quit)");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

fn print_event(event: &Event) {
    match event {
        Event::PlanProduced { steps, .. } => {
            println!("🧠 Planned {steps} step(s)");
        }
        Event::PlanningFailed { attempt, error, .. } => {
            println!("\x1b[33m⚠️  Planning attempt {attempt} failed: {error}\x1b[0m");
        }
        Event::StepDenied { rule_id, reason, .. } => {
            println!("\x1b[31m🚫 Denied by rule '{rule_id}': {reason}\x1b[0m");
        }
        Event::StepEscalated { reason, .. } => {
            println!("\x1b[33m⏸  Escalated: {reason}\x1b[0m");
        }
        Event::ApprovalResolved {
            approved,
            timed_out,
            ..
        } => {
            if *approved {
                println!("\x1b[32m✅ Approved\x1b[0m");
            } else if *timed_out {
                println!("\x1b[31m⏱  Approval timed out, denying\x1b[0m");
            } else {
                println!("\x1b[31m❌ Denied\x1b[0m");
            }
        }
        Event::StepExecuted {
            tool,
            status,
            attempt,
            ..
        } => {
            let (icon, color) = match status {
                ToolStatus::Success => ("✅", "\x1b[32m"),
                ToolStatus::Failure => ("❌", "\x1b[31m"),
                ToolStatus::Timeout => ("⏱ ", "\x1b[31m"),
            };
            let retry = if *attempt > 1 {
                format!(" (attempt {attempt})")
            } else {
                String::new()
            };
            println!("{color}{icon} {tool}{retry}\x1b[0m");
        }
        _ => {}
    }
}

fn print_report(report: &RunReport) {
    let (icon, color) = match report.status {
        RunStatus::Done => ("✅", "\x1b[32m"),
        RunStatus::Failed => ("❌", "\x1b[31m"),
        RunStatus::Aborted => ("⏹ ", "\x1b[33m"),
    };
    let elapsed = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;

    println!();
    println!(
        "{color}{icon} Run {}\x1b[0m — {}",
        report.status, report.reason
    );
    println!(
        "   Iterations: {}  Steps executed: {}  Elapsed: {elapsed:.1}s",
        report.iterations, report.steps_executed
    );
    if !report.final_observations.is_empty() {
        println!("   Results:");
        for result in &report.final_observations {
            let mark = match result.status {
                ToolStatus::Success => "✅",
                ToolStatus::Failure => "❌",
                ToolStatus::Timeout => "⏱ ",
            };
            let detail = match result.status {
                ToolStatus::Success => truncate_output(&result.output.to_string(), 100),
                _ => result.error_detail.clone().unwrap_or_default(),
            };
            println!(
                "     {mark} {} ({}ms) {}",
                result.tool, result.duration_ms, detail
            );
        }
    }
    println!("   Trace: drover trace {}", report.task_id);
}
