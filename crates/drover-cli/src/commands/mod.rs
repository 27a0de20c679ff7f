use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;
use std::sync::Arc;

use drover_config::{ConfigLoader, DroverConfig};
use drover_core::{DroverError, RecordFilter, RecordKind};
use drover_memory::{InMemoryStore, MemoryStore, SqliteStore, run_statistics};
use drover_runtime::{ToolRegistry, register_builtins};

mod init;
mod run;

use run::ApprovalMode;

/// 🐏 Drover — Auditable agent orchestration with policy gating and human approval
#[derive(Parser)]
#[command(name = "drover", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to drover.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one task through the plan–act–observe loop
    Run {
        /// The task objective, in plain language
        objective: String,

        /// Override the configured iteration cap
        #[arg(long)]
        max_steps: Option<u32>,

        /// Give up when the run outlives this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Constraint the plan must respect (repeatable)
        #[arg(long = "constraint")]
        constraints: Vec<String>,

        /// Approve every escalated step without prompting
        #[arg(long, conflicts_with = "deny_all")]
        approve_all: bool,

        /// Deny every escalated step without prompting
        #[arg(long, conflicts_with = "approve_all")]
        deny_all: bool,

        /// Keep the trace in memory instead of the configured database
        #[arg(long)]
        in_memory: bool,

        /// Print the final report as JSON (suppresses progress output)
        #[arg(long)]
        json: bool,
    },
    /// Re-run a task on a fixed interval until cancelled
    Loop {
        /// The task objective, in plain language
        objective: String,

        /// Seconds between rounds (overrides the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many rounds
        #[arg(long)]
        max_runs: Option<u32>,

        /// Approve every escalated step without prompting
        #[arg(long, conflicts_with = "deny_all")]
        approve_all: bool,

        /// Deny every escalated step without prompting
        #[arg(long, conflicts_with = "approve_all")]
        deny_all: bool,

        /// Keep the traces in memory instead of the configured database
        #[arg(long)]
        in_memory: bool,
    },
    /// Show the recorded trace of a task
    Trace {
        /// Task id, as printed by `drover run`
        task_id: String,

        /// Filter by record kind: plan, step, result, decision, hitl
        #[arg(short, long)]
        kind: Option<String>,

        /// Show at most this many records
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-task outcome statistics computed from the trace
    Stats {
        /// Task id; lists every recorded task when omitted
        task_id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the built-in tools and their risk metadata
    Tools,
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Initialize a new drover.toml in the current or home directory
    Init {
        /// Create in current directory instead of ~/.drover/
        #[arg(long)]
        local: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn run(self) -> drover_core::Result<()> {
        // Load config first so we can use it for log level and format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };

        // Initialize tracing with appropriate format
        if config.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .json()
                .with_target(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .with_target(false)
                .init();
        }

        match self.command {
            Commands::Run {
                objective,
                max_steps,
                deadline_secs,
                constraints,
                approve_all,
                deny_all,
                in_memory,
                json,
            } => {
                run::cmd_run(
                    config,
                    objective,
                    max_steps,
                    deadline_secs,
                    constraints,
                    ApprovalMode::from_flags(approve_all, deny_all),
                    in_memory,
                    json,
                )
                .await
            }
            Commands::Loop {
                objective,
                interval,
                max_runs,
                approve_all,
                deny_all,
                in_memory,
            } => {
                run::cmd_loop(
                    config,
                    objective,
                    interval,
                    max_runs,
                    ApprovalMode::from_flags(approve_all, deny_all),
                    in_memory,
                )
                .await
            }
            Commands::Trace {
                task_id,
                kind,
                limit,
                json,
            } => Self::cmd_trace(config, &task_id, kind.as_deref(), limit, json),
            Commands::Stats { task_id, json } => {
                Self::cmd_stats(config, task_id.as_deref(), json)
            }
            Commands::Tools => Self::cmd_tools(),
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Init { local } => init::cmd_init(local),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_trace(
        config: DroverConfig,
        task_id: &str,
        kind: Option<&str>,
        limit: Option<usize>,
        json: bool,
    ) -> drover_core::Result<()> {
        let task_id = parse_task_id(task_id)?;
        let store = open_store(&config, false)?;

        let mut filter = RecordFilter::default();
        if let Some(kind) = kind {
            filter.kinds = vec![parse_kind(kind)?];
        }
        filter.limit = limit;

        let records = store.query(task_id, &filter)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&records)?);
            return Ok(());
        }

        if records.is_empty() {
            println!("No records for task {task_id}");
            return Ok(());
        }

        println!(
            "\x1b[1mTrace for {task_id}\x1b[0m ({} records)",
            records.len()
        );
        println!("{}", "-".repeat(80));

        for record in &records {
            // Color-code by kind; results and decisions by their outcome
            let color = match record.kind {
                RecordKind::Plan => "\x1b[36m",
                RecordKind::Step => "\x1b[37m",
                RecordKind::Result => {
                    if record.payload["status"] == "success" {
                        "\x1b[32m"
                    } else {
                        "\x1b[31m"
                    }
                }
                RecordKind::Decision => {
                    if record.payload["verdict"] == "deny" {
                        "\x1b[31m"
                    } else {
                        "\x1b[33m"
                    }
                }
                RecordKind::Hitl => "\x1b[35m",
            };
            println!(
                "\x1b[90m#{:<4}\x1b[0m \x1b[90m{}\x1b[0m  {}{}\x1b[0m",
                record.sequence_no,
                record.timestamp.format("%H:%M:%S%.3f"),
                color,
                record.kind
            );
            println!(
                "   \x1b[90m{}\x1b[0m",
                truncate_output(&record.payload.to_string(), 160)
            );
        }

        Ok(())
    }

    fn cmd_stats(
        config: DroverConfig,
        task_id: Option<&str>,
        json: bool,
    ) -> drover_core::Result<()> {
        let store = open_store(&config, false)?;

        let Some(task_id) = task_id else {
            let ids = store.task_ids()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
                return Ok(());
            }
            if ids.is_empty() {
                println!("No tasks on record in {}", config.memory.db_path.display());
                return Ok(());
            }
            println!("\x1b[1m{} task(s) on record\x1b[0m", ids.len());
            for id in ids {
                let summary = store.summarize(id)?;
                let span = match (summary.first_recorded_at, summary.last_recorded_at) {
                    (Some(first), Some(last)) => format!(
                        "{} to {}",
                        first.format("%Y-%m-%d %H:%M:%S"),
                        last.format("%H:%M:%S")
                    ),
                    _ => "empty".to_string(),
                };
                println!(
                    "  {id}  {:>3} records  \x1b[90m{span}\x1b[0m",
                    summary.total
                );
            }
            return Ok(());
        };

        let task_id = parse_task_id(task_id)?;
        let stats = run_statistics(store.as_ref(), task_id)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("\x1b[1mTask {task_id}\x1b[0m");
        println!("   Plans produced: {}", stats.plans);
        println!(
            "   Steps: {} succeeded, {} failed, {} denied ({} attempts total)",
            stats.steps_succeeded, stats.steps_failed, stats.steps_denied, stats.total_attempts
        );
        println!(
            "   Approvals: {} requested, {} approved",
            stats.hitl_requests, stats.hitl_approved
        );
        println!("   Success rate: {:.0}%", stats.success_rate * 100.0);
        Ok(())
    }

    fn cmd_tools() -> drover_core::Result<()> {
        let registry = ToolRegistry::new();
        register_builtins(&registry)?;

        let specs = registry.specs();
        println!("\x1b[1m{} tool(s) registered\x1b[0m", specs.len());
        for spec in specs {
            let mut flags = Vec::new();
            if spec.mutating {
                flags.push("mutating");
            }
            if spec.idempotent {
                flags.push("idempotent");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!("  \x1b[33m[{}]\x1b[0m", flags.join(", "))
            };
            println!(
                "  {:<12} risk {:>2}  {}{}",
                spec.name, spec.risk_level, spec.description, flags
            );
        }
        Ok(())
    }

    fn cmd_config(config: DroverConfig, json: bool) -> drover_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config)
                    .map_err(|e| DroverError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> drover_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "drover", &mut std::io::stdout());
        Ok(())
    }
}

/// Open the configured trace store. `force_in_memory` is the CLI's
/// `--in-memory` flag; the config's own `memory.in_memory` also applies.
fn open_store(
    config: &DroverConfig,
    force_in_memory: bool,
) -> drover_core::Result<Arc<dyn MemoryStore>> {
    if force_in_memory || config.memory.in_memory {
        Ok(Arc::new(InMemoryStore::new()))
    } else {
        Ok(Arc::new(SqliteStore::open(&config.memory.db_path)?))
    }
}

fn parse_task_id(raw: &str) -> drover_core::Result<uuid::Uuid> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("'{raw}' is not a task id (expected a UUID)").into())
}

fn parse_kind(raw: &str) -> drover_core::Result<RecordKind> {
    RecordKind::parse(raw).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown record kind '{raw}' (expected plan, step, result, decision, or hitl)"
        )
        .into()
    })
}

/// Truncate a string to `max` bytes on a char boundary, appending "..." if
/// truncated. Newlines collapse to spaces so a record stays on one line.
fn truncate_output(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.replace('\n', " ")
    } else {
        let cut = (0..=max).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &s[..cut].replace('\n', " "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_kind_parsing() {
        assert_eq!(parse_kind("plan").ok(), Some(RecordKind::Plan));
        assert_eq!(parse_kind("hitl").ok(), Some(RecordKind::Hitl));
        assert!(parse_kind("bogus").is_err());
    }

    #[test]
    fn task_id_parsing() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_task_id(&id.to_string()).ok(), Some(id));
        assert!(parse_task_id("not-a-uuid").is_err());
    }

    #[test]
    fn truncation_keeps_char_boundaries() {
        assert_eq!(truncate_output("short", 10), "short");
        assert_eq!(truncate_output("line\nbreak", 20), "line break");
        let long = "x".repeat(30);
        assert_eq!(truncate_output(&long, 10), format!("{}...", "x".repeat(10)));
        // a 4-byte scalar straddling the cut must not panic
        assert_eq!(truncate_output("🐏🐏🐏", 5), "🐏...");
    }
}
