//! Phone Pilot 演示入口（dry-run）
//!
//! 加载配置、初始化日志，用模拟设备 / 截屏与脚本化模型跑通一个任务；Ctrl+C 停止任务。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use phone_pilot::config::{load_config, AppConfig};
use phone_pilot::core::{AgentBuilder, Orchestrator};
use phone_pilot::device::{RecordingOverlay, SimulatedCapture, SimulatedDevice};
use phone_pilot::llm::ScriptedModel;
use phone_pilot::observability;
use phone_pilot::react::{ChannelStatusSink, StatusEvent, TaskOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut words = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = Some(PathBuf::from(args.next().context("--config requires a path")?));
        } else {
            words.push(arg);
        }
    }
    let instruction = if words.is_empty() {
        "打开设置，搜索蓝牙".to_string()
    } else {
        words.join(" ")
    };

    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let device = Arc::new(
        SimulatedDevice::new(cfg.device.width, cfg.device.height).with_apps(cfg.device.apps.clone()),
    );
    let capture = Arc::new(SimulatedCapture::new(
        cfg.device.width.max(1) as u32,
        cfg.device.height.max(1) as u32,
    ));
    let (status, mut status_rx) = ChannelStatusSink::channel();

    let components = AgentBuilder::from_config(&cfg)
        .with_model(Arc::new(ScriptedModel::demo()))
        .with_device(device.clone())
        .with_capture(capture)
        .with_overlay(Arc::new(RecordingOverlay::new()))
        .with_status(Arc::new(status))
        .build()
        .context("Failed to build agent")?;

    // 状态事件在独立任务中消费（模拟 UI 线程）
    tokio::spawn(async move {
        while let Some(ev) = status_rx.recv().await {
            match ev {
                StatusEvent::Status { text, state } => tracing::info!(?state, "status: {}", text),
                StatusEvent::TaskRunning { running } => tracing::debug!(running, "task running"),
            }
        }
    });

    let mut orchestrator = Orchestrator::new(components);
    orchestrator
        .start_task(&instruction)
        .await
        .context("Failed to start task")?;

    let stopper = orchestrator.stopper();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, stopping task");
            stopper.stop();
        }
    });

    let report = orchestrator.wait().await.context("Task loop aborted")?;

    match &report.outcome {
        TaskOutcome::Finished { message } => tracing::info!(steps = report.steps, "Finished: {}", message),
        TaskOutcome::Cancelled => tracing::info!(steps = report.steps, "Stopped by user"),
        TaskOutcome::MaxStepsReached => tracing::warn!(steps = report.steps, "Step limit reached"),
        TaskOutcome::Fatal(e) => tracing::error!(steps = report.steps, "Task failed: {}", e),
    }
    tracing::info!(calls = device.calls().len(), messages = report.history.len(), "Dry run complete");
    Ok(())
}
