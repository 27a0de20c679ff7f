#[cfg(test)]
mod tests {
    use drover_core::*;
    use serde_json::json;
    use uuid::Uuid;

    // ── Task tests ─────────────────────────────────────────────

    #[test]
    fn test_task_builder() {
        let deadline = chrono::Utc::now() + chrono::Duration::minutes(5);
        let task = Task::new("clean up stale branches")
            .with_constraint("never touch main")
            .with_max_steps(4)
            .with_deadline(deadline);
        assert_eq!(task.objective, "clean up stale branches");
        assert_eq!(task.constraints, vec!["never touch main".to_string()]);
        assert_eq!(task.max_steps, Some(4));
        assert_eq!(task.deadline, Some(deadline));
    }

    #[test]
    fn test_task_validate_rejects_empty_objective() {
        let task = Task::new("   ");
        let err = task.validate().unwrap_err();
        assert!(matches!(err, DroverError::InvalidTask(_)));
    }

    #[test]
    fn test_task_validate_rejects_zero_max_steps() {
        let task = Task::new("do something").with_max_steps(0);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_task_serde_roundtrip() {
        let task = Task::new("ship it").with_max_steps(3);
        let json = serde_json::to_string(&task).unwrap();
        let restored: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, task.id);
        assert_eq!(restored.objective, "ship it");
        assert_eq!(restored.max_steps, Some(3));
    }

    // ── Phase & status tests ───────────────────────────────────

    #[test]
    fn test_phase_terminality() {
        assert!(Phase::Done.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(Phase::Aborted.is_terminal());
        assert!(!Phase::Planning.is_terminal());
        assert!(!Phase::AwaitingHuman.is_terminal());
    }

    #[test]
    fn test_phase_serde_snake_case() {
        let json = serde_json::to_string(&Phase::AwaitingHuman).unwrap();
        assert_eq!(json, "\"awaiting_human\"");
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Done.to_string(), "done");
        assert_eq!(RunStatus::Aborted.to_string(), "aborted");
    }

    // ── Plan & directive tests ─────────────────────────────────

    #[test]
    fn test_plan_construction() {
        let task = Task::new("echo twice");
        let steps = vec![
            Step::new("echo", json!({"text": "one"})).idempotent(),
            Step::new("echo", json!({"text": "two"})),
        ];
        let plan = Plan::new(task.id, steps, "two echoes");
        assert_eq!(plan.task_id, task.id);
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.steps[0].idempotent);
        assert!(!plan.steps[1].idempotent);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_directive_done() {
        let directive = Directive::done("all green");
        match directive {
            Directive::Done { summary } => assert_eq!(summary, "all green"),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn test_directive_serde_tagged() {
        let json = serde_json::to_string(&Directive::done("ok")).unwrap();
        assert!(json.contains("\"kind\":\"done\""));
    }

    // ── Tool tests ─────────────────────────────────────────────

    #[test]
    fn test_tool_spec_builder() {
        let spec = ToolSpec::new("shell", "run a command", json!({"type": "object"}))
            .mutating()
            .with_risk_level(9);
        assert!(spec.mutating);
        assert!(!spec.idempotent);
        assert_eq!(spec.risk_level, 9);
    }

    #[test]
    fn test_tool_result_success_check() {
        let result = ToolResult {
            step_id: Uuid::new_v4(),
            tool: "echo".into(),
            status: ToolStatus::Success,
            output: json!("hi"),
            error_detail: None,
            duration_ms: 3,
            attempt: 1,
        };
        assert!(result.is_success());
    }

    // ── Record tests ───────────────────────────────────────────

    #[test]
    fn test_record_kind_parse_roundtrip() {
        for kind in [
            RecordKind::Plan,
            RecordKind::Step,
            RecordKind::Result,
            RecordKind::Decision,
            RecordKind::Hitl,
        ] {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("bogus"), None);
    }

    #[test]
    fn test_record_filter_matches_kind_and_seq() {
        let record = MemoryRecord {
            task_id: Uuid::new_v4(),
            sequence_no: 5,
            kind: RecordKind::Result,
            payload: json!({}),
            timestamp: chrono::Utc::now(),
        };
        assert!(RecordFilter::default().matches(&record));
        assert!(RecordFilter::kind(RecordKind::Result).matches(&record));
        assert!(!RecordFilter::kind(RecordKind::Plan).matches(&record));

        let after = RecordFilter {
            after_seq: Some(5),
            ..Default::default()
        };
        assert!(!after.matches(&record));
        let before = RecordFilter {
            after_seq: Some(4),
            ..Default::default()
        };
        assert!(before.matches(&record));
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = DroverError::UnknownTool("frobnicate".into());
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_budget_exceeded_display() {
        let err = DroverError::BudgetExceeded {
            resource: "iterations".into(),
            used: 4.0,
            limit: 3.0,
        };
        let s = err.to_string();
        assert!(s.contains("iterations"));
        assert!(s.contains("limit 3"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parse_err = serde_json::from_str::<Task>("not json").unwrap_err();
        let err: DroverError = parse_err.into();
        assert!(matches!(err, DroverError::Serialization(_)));
    }

    // ── Event tests ────────────────────────────────────────────

    #[test]
    fn test_event_serde_tagged() {
        let event = Event::PhaseChanged {
            task_id: Uuid::new_v4(),
            phase: Phase::Executing,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"phase_changed\""));
        assert!(json.contains("\"executing\""));
    }

    #[tokio::test]
    async fn test_event_bus_pub_sub() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let task_id = Uuid::new_v4();
        bus.publish(Event::TaskStarted {
            task_id,
            objective: "x".into(),
        });
        match rx.recv().await.unwrap() {
            Event::TaskStarted { task_id: got, .. } => assert_eq!(got, task_id),
            other => panic!("expected TaskStarted, got {other:?}"),
        }
    }

    #[test]
    fn test_event_bus_publish_without_subscribers() {
        let bus = EventBus::default();
        // Must not panic or error with nobody listening.
        bus.publish(Event::Heartbeat {
            timestamp: chrono::Utc::now(),
        });
    }
}
