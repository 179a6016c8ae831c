//! 状态定义：任务步进状态与 TaskSnapshot 投影
//!
//! TaskStepState 只由编排循环持有和修改；前端只看到轻量的 TaskSnapshot（阶段、步数、最近错误），
//! 对话历史本身从不共享。

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;

/// 任务阶段：Starting -> Stepping -> {Finished | Cancelled | MaxStepsReached | Fatal}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Idle,
    Starting,
    Stepping,
    Finished,
    Cancelled,
    MaxStepsReached,
    Fatal,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskPhase::Finished | TaskPhase::Cancelled | TaskPhase::MaxStepsReached | TaskPhase::Fatal
        )
    }
}

/// 前端看到的「投影」状态
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub phase: TaskPhase,
    pub step: usize,
    pub max_steps: usize,
    pub running: bool,
    /// 最近一次即将执行的动作描述
    pub last_action: Option<String>,
    pub last_error: Option<String>,
}

impl Default for TaskSnapshot {
    fn default() -> Self {
        Self {
            phase: TaskPhase::Idle,
            step: 0,
            max_steps: 0,
            running: false,
            last_action: None,
            last_error: None,
        }
    }
}

/// 单个任务的步进状态：任务开始时创建，循环退出时销毁
#[derive(Debug)]
pub struct TaskStepState {
    pub step_index: usize,
    pub max_steps: usize,
    pub cancel_token: CancellationToken,
    pub last_error: Option<AgentError>,
    pub last_action: Option<String>,
    pub is_finished: bool,
}

impl TaskStepState {
    pub fn new(max_steps: usize, cancel_token: CancellationToken) -> Self {
        Self {
            step_index: 0,
            max_steps,
            cancel_token,
            last_error: None,
            last_action: None,
            is_finished: false,
        }
    }

    /// 循环条件：未取消且未达步数上限
    pub fn can_continue(&self) -> bool {
        !self.cancel_token.is_cancelled() && self.step_index < self.max_steps
    }

    /// 进入下一步，返回新的步号（从 1 开始）
    pub fn advance(&mut self) -> usize {
        self.step_index += 1;
        self.step_index
    }

    pub fn snapshot(&self, phase: TaskPhase) -> TaskSnapshot {
        TaskSnapshot {
            phase,
            step: self.step_index,
            max_steps: self.max_steps,
            running: !phase.is_terminal(),
            last_action: self.last_action.clone(),
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
        }
    }
}
