//! 任务步进主循环
//!
//! 每步：截屏 -> 拼 user 消息 -> 模型推理 -> 反转义与解析 -> 写入 assistant 消息 -> 保存截图
//! -> 执行动作 -> 失败时回写纠错提示 -> 剥离已回答的截图 -> 步间等待。
//! 退出路径：Finished（Finish 动作）、Cancelled（任一挂起点被取消）、MaxStepsReached（步数耗尽）、
//! Fatal（截屏失败、模型错误哨兵、执行器不可用）。所有外部失败都先转为 AgentError，再经 RecoveryEngine 决定继续或停止。

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::action::{cancellable_sleep, describe_action, extract_response_parts, parse_action, Action};
use crate::core::{AgentComponents, AgentError, RecoveryAction, RecoveryEngine, TaskPhase, TaskSnapshot, TaskStepState};
use crate::device::{OverlaySuspension, Screenshot};
use crate::llm::is_error_sentinel;
use crate::memory::{ContentPart, ConversationHistory, Message};
use crate::react::prompt::{build_user_text, screen_info, system_message, unescape_response, THINKING_STATUS};
use crate::react::AssistantState;

/// 任务完成时的状态文本
const FINISHED_STATUS: &str = "任务完成";

/// 循环参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub max_steps: usize,
    /// 步间等待
    pub step_delay: Duration,
    /// 截屏超时，超时视为截屏失败
    pub capture_timeout: Duration,
    /// 模型调用超时；None 表示只受取消控制
    pub model_timeout: Option<Duration>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_steps: 20,
            step_delay: Duration::from_millis(2000),
            capture_timeout: Duration::from_millis(5000),
            model_timeout: None,
        }
    }
}

/// 任务结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Finished { message: String },
    Cancelled,
    MaxStepsReached,
    Fatal(AgentError),
}

impl TaskOutcome {
    pub fn phase(&self) -> TaskPhase {
        match self {
            TaskOutcome::Finished { .. } => TaskPhase::Finished,
            TaskOutcome::Cancelled => TaskPhase::Cancelled,
            TaskOutcome::MaxStepsReached => TaskPhase::MaxStepsReached,
            TaskOutcome::Fatal(_) => TaskPhase::Fatal,
        }
    }
}

/// 任务执行结果：结束方式、实际步数与最终对话历史
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub outcome: TaskOutcome,
    pub steps: usize,
    pub history: Vec<Message>,
}

/// 单个任务的会话配置
pub struct StepSession {
    pub components: AgentComponents,
    pub recovery: RecoveryEngine,
    pub cancel_token: CancellationToken,
    /// 可选：向前端发布 TaskSnapshot
    pub state_tx: Option<Arc<watch::Sender<TaskSnapshot>>>,
}

impl StepSession {
    pub fn new(components: AgentComponents, cancel_token: CancellationToken) -> Self {
        Self {
            components,
            recovery: RecoveryEngine::new(),
            cancel_token,
            state_tx: None,
        }
    }

    pub fn with_state_tx(mut self, tx: Arc<watch::Sender<TaskSnapshot>>) -> Self {
        self.state_tx = Some(tx);
        self
    }

    fn publish(&self, state: &TaskStepState, phase: TaskPhase) {
        // send_replace 在没有订阅者时也会更新值
        if let Some(tx) = &self.state_tx {
            tx.send_replace(state.snapshot(phase));
        }
    }
}

/// 运行一个任务直到结束；历史在任务开始时新建（唯一 system 消息），随报告返回
pub async fn run_task(session: &StepSession, instruction: &str) -> TaskReport {
    let c = &session.components;
    let mut history = ConversationHistory::new();
    history.reset(system_message(&c.system_prompt, Local::now()));

    let mut state = TaskStepState::new(c.settings.max_steps, session.cancel_token.clone());
    session.publish(&state, TaskPhase::Starting);
    c.status.set_task_running(true);
    tracing::info!(instruction = %instruction, max_steps = state.max_steps, "Task started");

    // 控制端在前台时先回桌面，第 1 步跳过截屏
    let host_foreground = c.device.is_host_foreground();
    if host_foreground {
        tracing::debug!("Host app in foreground, going home");
        c.device.global_home();
    }

    let result = step_loop(session, &mut state, &mut history, instruction, host_foreground).await;
    let outcome = conclude(session, &mut state, result);
    session.publish(&state, outcome.phase());
    c.status.set_task_running(false);

    TaskReport {
        outcome,
        steps: state.step_index,
        history: history.into_messages(),
    }
}

/// Ok(Some(message))：Finish；Ok(None)：循环条件不再满足（取消或步数耗尽）
async fn step_loop(
    session: &StepSession,
    state: &mut TaskStepState,
    history: &mut ConversationHistory,
    instruction: &str,
    host_foreground: bool,
) -> Result<Option<String>, AgentError> {
    let c = &session.components;
    let token = &session.cancel_token;

    while state.can_continue() {
        let step = state.advance();
        session.publish(state, TaskPhase::Stepping);
        c.status.update_status(THINKING_STATUS, AssistantState::Processing);
        tracing::debug!(step, "Step started");

        let shot = if step == 1 && host_foreground {
            tracing::debug!("Step 1: skipping capture");
            None
        } else {
            Some(Arc::new(capture_screen(session).await?))
        };

        let info = screen_info(c.device.current_app().as_deref());
        let mut parts = Vec::with_capacity(2);
        if let Some(shot) = &shot {
            parts.push(ContentPart::Image(shot.clone()));
        }
        parts.push(ContentPart::Text(build_user_text(step, instruction, &info)));
        history.push(Message::user_parts(parts));

        let raw = infer(session, history, shot.as_deref()).await?;
        let response = unescape_response(&raw);
        if is_error_sentinel(&response) {
            return Err(AgentError::ModelError(response));
        }

        let (reasoning, action_str) = extract_response_parts(&response);
        tracing::info!(step, reasoning = %reasoning, action = %action_str, "Model reply");
        history.push(Message::assistant(format!("{}{}", reasoning, action_str)));

        if let Some(shot) = &shot {
            persist_capture(session, shot.clone());
        }

        let action = parse_action(&action_str, c.device.screen_width(), c.device.screen_height());
        let description = describe_action(&action);
        c.status.update_status(&description, AssistantState::Processing);
        state.last_action = Some(description.clone());

        if token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let ok = c.executor.execute(&action, token).await?;
        if let Action::Finish { message } = action {
            state.is_finished = true;
            return Ok(Some(message));
        }
        if !ok {
            let err = match action {
                Action::Error { reason } => AgentError::ParseError(reason),
                _ => AgentError::ExecutionFailed(description),
            };
            tracing::warn!(step, error = %err, "Action failed, feeding back to model");
            match session.recovery.handle(&err) {
                RecoveryAction::RetryWithPrompt(prompt) => history.push(Message::user(prompt)),
                RecoveryAction::Stop | RecoveryAction::Abort(_) => return Err(err),
            }
            state.last_error = Some(err);
        }

        history.strip_answered_images();
        cancellable_sleep(c.settings.step_delay, token).await?;
    }
    Ok(None)
}

/// 截屏：挂起悬浮窗，受超时与取消约束；失败为致命错误
async fn capture_screen(session: &StepSession) -> Result<Screenshot, AgentError> {
    let c = &session.components;
    let timeout = c.settings.capture_timeout;
    let _hidden = OverlaySuspension::acquire(c.overlay.as_ref()).await;
    let captured = tokio::select! {
        _ = session.cancel_token.cancelled() => return Err(AgentError::Cancelled),
        res = tokio::time::timeout(timeout, c.capture.capture(timeout)) => res,
    };
    match captured {
        Ok(Some(shot)) => Ok(shot),
        Ok(None) => Err(AgentError::CaptureFailed("capture returned no image".to_string())),
        Err(_) => Err(AgentError::CaptureFailed(format!(
            "capture timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}

/// 模型推理：可取消，可选超时；调用失败转为 ModelError
async fn infer(
    session: &StepSession,
    history: &ConversationHistory,
    image: Option<&Screenshot>,
) -> Result<String, AgentError> {
    let c = &session.components;
    let call = async {
        match c.settings.model_timeout {
            Some(limit) => tokio::time::timeout(limit, c.model.infer(history.messages(), image))
                .await
                .unwrap_or_else(|_| Err(format!("Error: model call timed out after {}s", limit.as_secs()))),
            None => c.model.infer(history.messages(), image).await,
        }
    };
    tokio::select! {
        _ = session.cancel_token.cancelled() => Err(AgentError::Cancelled),
        res = call => res.map_err(AgentError::ModelError),
    }
}

/// 截图落盘不阻塞循环，失败只记日志
fn persist_capture(session: &StepSession, shot: Arc<Screenshot>) {
    let store = session.components.image_store.clone();
    tokio::spawn(async move {
        match store.save(&shot).await {
            Some(path) => tracing::debug!(path = %path.display(), "Screenshot saved"),
            None => tracing::warn!("Screenshot not persisted"),
        }
    });
}

/// 把循环结果映射为结束方式，并更新 UI 状态
fn conclude(
    session: &StepSession,
    state: &mut TaskStepState,
    result: Result<Option<String>, AgentError>,
) -> TaskOutcome {
    let c = &session.components;
    let err = match result {
        Ok(Some(message)) => {
            tracing::info!(steps = state.step_index, message = %message, "Task finished");
            let text = if message.is_empty() {
                FINISHED_STATUS.to_string()
            } else {
                format!("{}: {}", FINISHED_STATUS, message)
            };
            c.status.update_status(&text, AssistantState::Success);
            return TaskOutcome::Finished { message };
        }
        Ok(None) if session.cancel_token.is_cancelled() => AgentError::Cancelled,
        Ok(None) => AgentError::BudgetExhausted {
            max_steps: state.max_steps,
        },
        Err(e) => e,
    };

    // 可恢复错误已在 step_loop 内回写，到这里只剩停止或终止
    let message = match session.recovery.handle(&err) {
        RecoveryAction::Stop => {
            tracing::info!(steps = state.step_index, "Task cancelled");
            return TaskOutcome::Cancelled;
        }
        RecoveryAction::Abort(message) => message,
        RecoveryAction::RetryWithPrompt(_) => err.to_string(),
    };
    c.status.update_status(&message, AssistantState::Error);
    let outcome = if matches!(err, AgentError::BudgetExhausted { .. }) {
        tracing::warn!(steps = state.step_index, "Task stopped at step limit");
        TaskOutcome::MaxStepsReached
    } else {
        tracing::error!(steps = state.step_index, error = %err, "Task failed");
        TaskOutcome::Fatal(err.clone())
    };
    state.last_error = Some(err);
    outcome
}
