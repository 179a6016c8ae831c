//! 任务步进循环集成测试：终止条件、取消、失败回写、致命错误与历史裁剪

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use phone_pilot::action::ExecutorTiming;
    use phone_pilot::core::{
        AgentBuilder, AgentComponents, AgentError, TaskPhase, TaskSnapshot, LAST_ACTION_FAILED_PROMPT,
        MAX_STEPS_MESSAGE,
    };
    use phone_pilot::device::{DeviceCall, RecordingOverlay, SimulatedCapture, SimulatedDevice};
    use phone_pilot::llm::ScriptedModel;
    use phone_pilot::memory::Role;
    use phone_pilot::react::{
        run_task, AssistantState, LoopSettings, RecordingStatusSink, StepSession, TaskOutcome,
    };
    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        model: Arc<ScriptedModel>,
        device: Arc<SimulatedDevice>,
        capture: Arc<SimulatedCapture>,
        status: Arc<RecordingStatusSink>,
        overlay: Arc<RecordingOverlay>,
    }

    impl Harness {
        fn new(model: ScriptedModel) -> Self {
            Self::with_device(model, SimulatedDevice::new(1080, 2400))
        }

        fn with_device(model: ScriptedModel, device: SimulatedDevice) -> Self {
            Self {
                model: Arc::new(model),
                device: Arc::new(device),
                capture: Arc::new(SimulatedCapture::new(1080, 2400)),
                status: Arc::new(RecordingStatusSink::new()),
                overlay: Arc::new(RecordingOverlay::new()),
            }
        }

        fn components(&self, settings: LoopSettings, timing: ExecutorTiming) -> AgentComponents {
            AgentBuilder::new()
                .with_model(self.model.clone())
                .with_device(self.device.clone())
                .with_capture(self.capture.clone())
                .with_status(self.status.clone())
                .with_overlay(self.overlay.clone())
                .with_timing(timing)
                .with_settings(settings)
                .with_system_prompt("SYSTEM")
                .build()
                .unwrap()
        }

        fn session(&self, max_steps: usize) -> StepSession {
            StepSession::new(
                self.components(settings(max_steps), ExecutorTiming::immediate()),
                CancellationToken::new(),
            )
        }
    }

    fn settings(max_steps: usize) -> LoopSettings {
        LoopSettings {
            max_steps,
            step_delay: Duration::ZERO,
            capture_timeout: Duration::from_millis(200),
            model_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_finish_on_step_one() {
        let h = Harness::new(ScriptedModel::repeating(r#"任务很简单。 finish("done")"#));
        let report = run_task(&h.session(20), "打开设置").await;

        assert_eq!(report.outcome, TaskOutcome::Finished { message: "done".to_string() });
        assert_eq!(report.steps, 1);
        assert_eq!(h.model.call_count(), 1);
        assert_eq!(h.status.last_state(), Some(AssistantState::Success));
    }

    #[tokio::test]
    async fn test_never_finishing_stops_at_max_steps() {
        let h = Harness::new(ScriptedModel::repeating(r#"继续返回 do(action="Back")"#));
        let report = run_task(&h.session(4), "一直返回").await;

        assert_eq!(report.outcome, TaskOutcome::MaxStepsReached);
        assert_eq!(report.steps, 4);
        assert_eq!(h.model.call_count(), 4);
        assert_eq!(h.device.calls(), vec![DeviceCall::Back; 4]);
        let (text, state) = h.status.statuses().last().cloned().unwrap();
        assert_eq!(text, MAX_STEPS_MESSAGE);
        assert_eq!(state, AssistantState::Error);
    }

    #[tokio::test]
    async fn test_history_has_single_system_message_and_concatenated_assistant() {
        let h = Harness::new(ScriptedModel::new([
            r#"先返回。 do(action="Back")"#,
            r#"完成 finish(message="ok")"#,
        ]));
        let report = run_task(&h.session(10), "测试").await;

        let systems: Vec<_> = report.history.iter().filter(|m| m.role == Role::System).collect();
        assert_eq!(systems.len(), 1);
        assert!(systems[0].text().ends_with("\nSYSTEM"));
        assert_eq!(report.history[0].role, Role::System);

        let assistants: Vec<String> = report
            .history
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.text())
            .collect();
        assert_eq!(assistants[0], r#"先返回。do(action="Back")"#);
        assert_eq!(assistants[1], r#"完成finish(message="ok")"#);

        let users: Vec<String> = report
            .history
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text())
            .collect();
        assert!(users[0].starts_with("测试\n\n"));
        assert!(users[1].starts_with("** Screen Info **"));
    }

    #[tokio::test]
    async fn test_at_most_one_image_in_history() {
        let h = Harness::new(
            ScriptedModel::new([
                r#"do(action="Tap", element=[500, 500])"#,
                r#"do(action="Teleport")"#,
                r#"do(action="Back")"#,
                r#"do(action="Home")"#,
            ])
            .with_fallback(r#"finish("ok")"#),
        );
        let report = run_task(&h.session(10), "测试").await;
        assert!(matches!(report.outcome, TaskOutcome::Finished { .. }));

        for call in h.model.calls() {
            assert!(call.had_image);
            assert_eq!(call.image_messages, 1, "{:?}", call);
        }
        // 最后一步的截图被回答后不会再被剥离
        assert!(report.history.iter().filter(|m| m.has_image()).count() <= 1);
    }

    #[tokio::test]
    async fn test_failed_action_appends_one_feedback_message() {
        let h = Harness::new(ScriptedModel::new([
            r#"打开一个不存在的应用 do(action="Launch", app="不存在")"#,
            r#"finish(message="放弃")"#,
        ]));
        let report = run_task(&h.session(10), "测试").await;

        assert_eq!(report.outcome, TaskOutcome::Finished { message: "放弃".to_string() });
        assert_eq!(report.steps, 2);
        let feedback: Vec<_> = report
            .history
            .iter()
            .filter(|m| m.role == Role::User && m.text() == LAST_ACTION_FAILED_PROMPT)
            .collect();
        assert_eq!(feedback.len(), 1);
        // 回写消息紧跟在失败步的 assistant 之后
        let idx = report
            .history
            .iter()
            .position(|m| m.text() == LAST_ACTION_FAILED_PROMPT)
            .unwrap();
        assert_eq!(report.history[idx - 1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_unparsable_action_is_fed_back_not_fatal() {
        let h = Harness::new(ScriptedModel::new([
            "我不知道该做什么",
            r#"do(action="Tap", element=[500])"#,
            r#"finish("ok")"#,
        ]));
        let report = run_task(&h.session(10), "测试").await;

        assert!(matches!(report.outcome, TaskOutcome::Finished { .. }));
        assert_eq!(report.steps, 3);
        let feedback = report
            .history
            .iter()
            .filter(|m| m.text() == LAST_ACTION_FAILED_PROMPT)
            .count();
        assert_eq!(feedback, 2);
        assert!(h.device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_action_recorded_as_parse_error() {
        let h = Harness::new(ScriptedModel::new([
            r#"do(action="Tap", element=[500])"#,
            r#"finish("ok")"#,
        ]));
        let (tx, rx) = watch::channel(TaskSnapshot::default());
        let session = h.session(10).with_state_tx(Arc::new(tx));
        let report = run_task(&session, "测试").await;

        assert!(matches!(report.outcome, TaskOutcome::Finished { .. }));
        let snap = rx.borrow().clone();
        assert_eq!(snap.phase, TaskPhase::Finished);
        assert!(snap.last_error.unwrap().starts_with("Action parse error"));
    }

    #[tokio::test]
    async fn test_prose_before_call_does_not_hide_action() {
        let h = Harness::new(ScriptedModel::new([
            r#"I will do (as asked) one step. do(action="Back")"#,
            r#"finish("ok")"#,
        ]));
        let report = run_task(&h.session(10), "返回").await;

        assert_eq!(report.steps, 2);
        assert_eq!(h.device.calls(), vec![DeviceCall::Back]);
        assert!(!report.history.iter().any(|m| m.text() == LAST_ACTION_FAILED_PROMPT));
    }

    #[tokio::test]
    async fn test_capture_failure_is_fatal() {
        let h = Harness::new(ScriptedModel::repeating(r#"do(action="Back")"#));
        h.capture.set_fail(true);
        let report = run_task(&h.session(10), "测试").await;

        assert!(matches!(report.outcome, TaskOutcome::Fatal(AgentError::CaptureFailed(_))));
        assert_eq!(report.steps, 1);
        assert_eq!(h.model.call_count(), 0);
        assert_eq!(h.status.last_state(), Some(AssistantState::Error));
        // 截屏期间挂起的悬浮窗已恢复
        assert!(!h.overlay.is_hidden());
        assert_eq!(h.overlay.suspend_count(), h.overlay.restore_count());
    }

    #[tokio::test]
    async fn test_capture_timeout_is_fatal() {
        let mut h = Harness::new(ScriptedModel::repeating(r#"do(action="Back")"#));
        h.capture = Arc::new(SimulatedCapture::new(1080, 2400).with_latency(Duration::from_secs(10)));
        let started = Instant::now();
        let report = run_task(&h.session(10), "测试").await;

        assert!(matches!(report.outcome, TaskOutcome::Fatal(AgentError::CaptureFailed(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_model_error_sentinel_is_fatal() {
        let h = Harness::new(ScriptedModel::new(["Error: 401 Unauthorized"]));
        let report = run_task(&h.session(10), "测试").await;

        assert_eq!(
            report.outcome,
            TaskOutcome::Fatal(AgentError::ModelError("Error: 401 Unauthorized".to_string()))
        );
        let (text, state) = h.status.statuses().last().cloned().unwrap();
        assert_eq!(text, "Error: 401 Unauthorized");
        assert_eq!(state, AssistantState::Error);
    }

    #[tokio::test]
    async fn test_model_call_failure_is_fatal() {
        let model = ScriptedModel::new([r#"do(action="Back")"#]);
        model.push_failure("connection reset");
        let h = Harness::new(model);
        let report = run_task(&h.session(10), "测试").await;

        assert_eq!(
            report.outcome,
            TaskOutcome::Fatal(AgentError::ModelError("connection reset".to_string()))
        );
        assert_eq!(report.steps, 2);
    }

    #[tokio::test]
    async fn test_executor_unavailable_is_fatal() {
        let h = Harness::new(ScriptedModel::repeating(r#"do(action="Back")"#));
        h.device.set_available(false);
        let report = run_task(&h.session(10), "测试").await;

        assert_eq!(report.outcome, TaskOutcome::Fatal(AgentError::ExecutorUnavailable));
        assert_eq!(report.steps, 1);
    }

    #[tokio::test]
    async fn test_host_foreground_goes_home_and_skips_first_capture() {
        let h = Harness::with_device(
            ScriptedModel::new([r#"do(action="Back")"#, r#"finish("ok")"#]),
            SimulatedDevice::new(1080, 2400).with_host_foreground(true),
        );
        let report = run_task(&h.session(10), "测试").await;

        assert!(matches!(report.outcome, TaskOutcome::Finished { .. }));
        assert_eq!(h.device.calls()[0], DeviceCall::Home);
        let calls = h.model.calls();
        assert!(!calls[0].had_image);
        assert!(calls[1].had_image);
        assert_eq!(h.capture.capture_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_step_delay() {
        let h = Harness::new(ScriptedModel::repeating(r#"do(action="Back")"#));
        let token = CancellationToken::new();
        let mut loop_settings = settings(20);
        loop_settings.step_delay = Duration::from_secs(30);
        let session = StepSession::new(
            h.components(loop_settings, ExecutorTiming::immediate()),
            token.clone(),
        );

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let started = Instant::now();
        let report = run_task(&session, "测试").await;

        assert_eq!(report.outcome, TaskOutcome::Cancelled);
        assert_eq!(report.steps, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        // 取消不向用户报错
        assert!(h
            .status
            .statuses()
            .iter()
            .all(|(_, state)| *state != AssistantState::Error));
        assert!(!h.status.is_running());
    }

    #[tokio::test]
    async fn test_cancel_mid_settle_runs_no_further_steps() {
        let h = Harness::new(ScriptedModel::repeating(r#"do(action="Tap", element=[500, 500])"#));
        let token = CancellationToken::new();
        let timing = ExecutorTiming {
            settle: Duration::from_secs(30),
            ..ExecutorTiming::immediate()
        };
        let session = StepSession::new(h.components(settings(20), timing), token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let report = run_task(&session, "测试").await;

        assert_eq!(report.outcome, TaskOutcome::Cancelled);
        assert_eq!(report.steps, 1);
        assert_eq!(h.model.call_count(), 1);
        assert_eq!(h.device.calls(), vec![DeviceCall::Tap { x: 540, y: 1200 }]);
    }

    #[tokio::test]
    async fn test_cancel_during_model_call() {
        let h = Harness::new(
            ScriptedModel::repeating(r#"do(action="Back")"#).with_latency(Duration::from_secs(30)),
        );
        let token = CancellationToken::new();
        let session = StepSession::new(
            h.components(settings(20), ExecutorTiming::immediate()),
            token.clone(),
        );
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let report = run_task(&session, "测试").await;

        assert_eq!(report.outcome, TaskOutcome::Cancelled);
        assert!(h.device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_escaped_response_is_unescaped_before_parsing() {
        let h = Harness::new(ScriptedModel::new([
            r#"思考\n点击 do(action=\"Tap\", element=[500, 750])"#,
            r#"finish(message=\"ok\")"#,
        ]));
        let report = run_task(&h.session(10), "测试").await;

        assert_eq!(report.outcome, TaskOutcome::Finished { message: "ok".to_string() });
        assert_eq!(h.device.calls(), vec![DeviceCall::Tap { x: 540, y: 1800 }]);
    }

    #[tokio::test]
    async fn test_gestures_and_captures_restore_overlay() {
        let h = Harness::new(ScriptedModel::new([
            r#"do(action="Swipe", start=[500, 800], end=[500, 200])"#,
            r#"finish("ok")"#,
        ]));
        run_task(&h.session(10), "测试").await;

        // 2 次截屏 + 1 次滑动
        assert_eq!(h.overlay.suspend_count(), 3);
        assert_eq!(h.overlay.restore_count(), 3);
        assert!(!h.overlay.is_hidden());
    }
}
