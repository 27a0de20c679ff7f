#[cfg(test)]
mod tests {
    use drover_config::ConfigLoader;
    use drover_config::schema::*;
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_drover_config_defaults() {
        let config = DroverConfig::default();
        assert_eq!(config.orchestrator.max_steps, 20);
        assert_eq!(config.orchestrator.planning_timeout_secs, 30);
        assert_eq!(config.orchestrator.planning_retries, 2);
        assert_eq!(config.orchestrator.step_timeout_secs, 60);
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 200);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.max_delay_ms, 5_000);
    }

    #[test]
    fn test_policy_config_defaults_fail_closed() {
        let config = PolicyConfig::default();
        assert_eq!(config.default_verdict, "deny");
        assert!(config.denylist.is_empty());
        assert!(config.allowlist.is_empty());
        assert_eq!(config.risk_threshold, Some(7));
        assert!(config.escalate_mutating);
    }

    #[test]
    fn test_hitl_and_driver_defaults() {
        assert_eq!(HitlConfig::default().timeout_secs, 120);
        let driver = DriverConfig::default();
        assert_eq!(driver.interval_secs, 300);
        assert!(driver.max_runs.is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    #[test]
    fn test_duration_helpers() {
        let config = DroverConfig::default();
        assert_eq!(config.orchestrator.planning_timeout().as_secs(), 30);
        assert_eq!(config.orchestrator.step_timeout().as_secs(), 60);
        assert_eq!(config.retry.base_delay().as_millis(), 200);
        assert_eq!(config.retry.max_delay().as_millis(), 5_000);
        assert_eq!(config.hitl.timeout().as_secs(), 120);
        assert_eq!(config.driver.interval().as_secs(), 300);
    }

    // ── TOML roundtrip tests ───────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = DroverConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: DroverConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.orchestrator.max_steps, config.orchestrator.max_steps);
        assert_eq!(restored.policy.default_verdict, config.policy.default_verdict);
        assert_eq!(restored.memory.db_path, config.memory.db_path);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[orchestrator]
max_steps = 5

[policy]
default_verdict = "allow"
"#;
        let config: DroverConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.orchestrator.max_steps, 5);
        assert_eq!(config.policy.default_verdict, "allow");
        // Defaults should fill in
        assert_eq!(config.orchestrator.step_timeout_secs, 60);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.hitl.timeout_secs, 120);
    }

    #[test]
    fn test_planner_rules_deserialize() {
        let toml_str = r#"
[[planner.rules]]
name = "greet"
trigger = "greet"

[[planner.rules.steps]]
tool = "echo"
arguments = { text = "hello from {objective}" }
expected_effect = "say hello"
idempotent = true

[[planner.rules.steps]]
tool = "shell"
arguments = { command = "uptime" }
"#;
        let config: DroverConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.planner.rules.len(), 1);
        let rule = &config.planner.rules[0];
        assert_eq!(rule.name, "greet");
        assert_eq!(rule.steps.len(), 2);
        assert_eq!(rule.steps[0].tool, "echo");
        assert!(rule.steps[0].idempotent);
        assert_eq!(
            rule.steps[0].arguments["text"].as_str().unwrap(),
            "hello from {objective}"
        );
        assert!(!rule.steps[1].idempotent);
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_validates_clean() {
        let warnings = DroverConfig::default().validate().unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn test_zero_max_steps_is_an_error() {
        let mut config = DroverConfig::default();
        config.orchestrator.max_steps = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("orchestrator.max_steps"));
    }

    #[test]
    fn test_bad_default_verdict_is_an_error() {
        let mut config = DroverConfig::default();
        config.policy.default_verdict = "maybe".into();
        let err = config.validate().unwrap_err();
        assert!(err.contains("policy.default_verdict"));
    }

    #[test]
    fn test_fail_open_warns_but_passes() {
        let mut config = DroverConfig::default();
        config.policy.default_verdict = "allow".into();
        let warnings = config.validate().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| w.field == "policy.default_verdict"
                    && w.severity == WarningSeverity::Warning)
        );
    }

    #[test]
    fn test_shrinking_backoff_warns() {
        let mut config = DroverConfig::default();
        config.retry.backoff_multiplier = 0.5;
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "retry.backoff_multiplier"));
    }

    #[test]
    fn test_empty_planner_rule_warns() {
        let mut config = DroverConfig::default();
        config.planner.rules.push(PlannerRuleConfig {
            name: "hollow".into(),
            trigger: "  ".into(),
            steps: vec![],
        });
        let warnings = config.validate().unwrap();
        assert_eq!(
            warnings
                .iter()
                .filter(|w| w.field.starts_with("planner.rules[0]"))
                .count(),
            2
        );
    }

    // ── ConfigLoader tests ─────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("drover.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[orchestrator]
max_steps = 8
step_timeout_secs = 15

[policy]
default_verdict = "deny"
denylist = ["shell"]

[hitl]
timeout_secs = 45
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert_eq!(config.orchestrator.max_steps, 8);
        assert_eq!(config.orchestrator.step_timeout_secs, 15);
        assert_eq!(config.policy.denylist, vec!["shell".to_string()]);
        assert_eq!(config.hitl.timeout_secs, 45);
        assert_eq!(loader.path(), config_path.as_path());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("absent.toml");
        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        assert_eq!(loader.get().orchestrator.max_steps, 20);
    }

    #[test]
    fn test_config_loader_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("drover.toml");
        std::fs::write(
            &config_path,
            r#"
[orchestrator]
max_steps = 0
"#,
        )
        .unwrap();

        let err = ConfigLoader::load(Some(config_path.as_path())).unwrap_err();
        match err {
            drover_core::DroverError::Config(msg) => {
                assert!(msg.contains("orchestrator.max_steps"))
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    // ── JSON roundtrip ─────────────────────────────────────────

    #[test]
    fn test_config_json_roundtrip() {
        let config = DroverConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: DroverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.orchestrator.max_steps, config.orchestrator.max_steps);
    }
}
