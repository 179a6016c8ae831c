//! Agent 编排器：任务生命周期
//!
//! Orchestrator 同一时刻最多运行一个任务循环：start_task 先取消并等待旧循环退出，再在 tokio 上启动新循环；
//! stop_task 取消当前循环；wait 取回 TaskReport。TaskSnapshot 通过 watch 通道发布给前端。
//! create_agent 在此之上建立命令通道（Submit/Stop/Quit），由后台任务消费。

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::core::{AgentComponents, AgentError, SessionSupervisor, TaskSnapshot};
use crate::react::{run_task, AssistantState, StatusSink, StepSession, TaskReport};

/// 停止任务后的状态文本
const STOPPED_STATUS: &str = "已停止";

/// 从前端发往编排器的命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交任务指令（替换正在运行的任务）
    Submit(String),
    /// 停止当前任务
    Stop,
    /// 退出
    Quit,
}

/// 可跨任务持有的停止句柄（信号处理等场景）
#[derive(Clone)]
pub struct TaskStopper {
    supervisor: Arc<SessionSupervisor>,
    status: Arc<dyn StatusSink>,
}

impl TaskStopper {
    /// 取消当前任务，UI 回到空闲
    pub fn stop(&self) {
        self.supervisor.cancel();
        self.status.set_task_running(false);
        self.status.update_status(STOPPED_STATUS, AssistantState::Idle);
    }
}

/// 任务编排器
pub struct Orchestrator {
    components: AgentComponents,
    supervisor: Arc<SessionSupervisor>,
    state_tx: Arc<watch::Sender<TaskSnapshot>>,
    running: Option<JoinHandle<TaskReport>>,
}

impl Orchestrator {
    pub fn new(components: AgentComponents) -> Self {
        let (state_tx, _) = watch::channel(TaskSnapshot::default());
        Self {
            components,
            supervisor: Arc::new(SessionSupervisor::new()),
            state_tx: Arc::new(state_tx),
            running: None,
        }
    }

    /// 订阅任务状态投影
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.state_tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 启动新任务；正在运行的任务先被取消并等待其退出
    pub async fn start_task(&mut self, instruction: &str) -> Result<(), AgentError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(AgentError::EmptyInstruction);
        }
        if self.supervisor.is_shut_down() {
            return Err(AgentError::Cancelled);
        }

        if let Some(previous) = self.running.take() {
            tracing::info!("Replacing running task");
            self.supervisor.cancel();
            if let Err(e) = previous.await {
                tracing::warn!(error = %e, "Previous task did not exit cleanly");
            }
        }

        let token = self.supervisor.begin_task();
        let session = StepSession::new(self.components.clone(), token).with_state_tx(self.state_tx.clone());
        let instruction = instruction.to_string();
        self.running = Some(tokio::spawn(async move { run_task(&session, &instruction).await }));
        Ok(())
    }

    /// 取消当前任务，UI 回到空闲
    pub fn stop_task(&self) {
        self.stopper().stop();
    }

    pub fn stopper(&self) -> TaskStopper {
        TaskStopper {
            supervisor: self.supervisor.clone(),
            status: self.components.status.clone(),
        }
    }

    /// 等待当前任务结束；没有任务或任务异常退出时返回 None
    pub async fn wait(&mut self) -> Option<TaskReport> {
        let handle = self.running.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Task loop aborted");
                None
            }
        }
    }

    /// 启动任务并等待完成
    pub async fn run_to_completion(&mut self, instruction: &str) -> Result<TaskReport, AgentError> {
        self.start_task(instruction).await?;
        self.wait().await.ok_or(AgentError::Cancelled)
    }

    /// 退出：取消所有任务并等待当前循环结束
    pub async fn shutdown(&mut self) {
        self.supervisor.shutdown();
        if let Some(report) = self.wait().await {
            tracing::info!(outcome = ?report.outcome, "Task ended on shutdown");
        }
    }
}

/// 创建 Agent 运行时：返回命令发送端与状态接收端；后台任务消费命令并驱动 Orchestrator。
pub fn create_agent(
    components: AgentComponents,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<TaskSnapshot>) {
    let mut orchestrator = Orchestrator::new(components);
    let state_rx = orchestrator.subscribe();
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Submit(instruction) => {
                    if let Err(e) = orchestrator.start_task(&instruction).await {
                        tracing::warn!(error = %e, "Task not started");
                    }
                }
                Command::Stop => orchestrator.stop_task(),
                Command::Quit => break,
            }
        }
        // cmd_tx 全部关闭或收到 Quit
        orchestrator.shutdown().await;
    });

    (cmd_tx, state_rx)
}
