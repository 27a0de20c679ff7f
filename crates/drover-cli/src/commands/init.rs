use std::path::PathBuf;

/// Write a starter drover.toml with the common knobs spelled out.
pub(super) fn cmd_init(local: bool) -> drover_core::Result<()> {
    let dir = if local {
        std::env::current_dir()?
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".drover")
    };

    std::fs::create_dir_all(&dir)?;
    let config_path = dir.join("drover.toml");

    if config_path.exists() {
        println!("⚠️  {} already exists", config_path.display());
        println!("   Edit it directly, or delete it and run 'drover init' again.");
        return Ok(());
    }

    // Starter config: safe enough to leave as-is, complete enough that
    // `drover run "greet the team"` does something out of the box.
    let minimal = r#"# 🐏 Drover Configuration
# Every key is optional; missing keys fall back to built-in defaults.

[orchestrator]
max_steps = 20
# planning_timeout_secs = 30
# planning_retries = 2
# step_timeout_secs = 60

[retry]
# max_attempts = 3
# base_delay_ms = 200
# backoff_multiplier = 2.0
# max_delay_ms = 5000

[policy]
default_verdict = "deny"      # steps no rule matches are denied
allowlist = ["echo", "file_read"]
# denylist = ["shell"]
# risk_threshold = 7          # escalate tools whose risk level exceeds this
# escalate_mutating = true
# denied_argument_patterns = ["rm -rf", "sudo "]

[hitl]
# timeout_secs = 120          # unanswered escalations deny after this long

[memory]
db_path = "drover.db"
# in_memory = false

[logging]
level = "info"
# format = "pretty"           # or "json"

[driver]
# interval_secs = 300         # 'drover loop' cadence
# max_runs = 10

# Planner rules drive the built-in rule-based brain: when the objective
# mentions the trigger, the rule's steps accomplish it.
[[planner.rules]]
name = "greet"
trigger = "greet"

[[planner.rules.steps]]
tool = "echo"
arguments = { text = "hello from: {objective}" }
idempotent = true
"#;

    std::fs::write(&config_path, minimal)?;
    println!("✅ Created {}", config_path.display());
    println!("   Edit it, then try: drover run \"greet the team\"");
    Ok(())
}
