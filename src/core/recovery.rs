//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供步进循环决定是回写失败提示继续、静默停止还是报错终止。

use crate::core::{AgentError, RecoveryAction};

/// 上一步动作失败时回写给模型的提示
pub const LAST_ACTION_FAILED_PROMPT: &str =
    "上一步操作执行失败，屏幕可能没有变化。请根据当前屏幕重新判断，换一种方式完成任务。";

/// 步数耗尽时展示给用户的提示
pub const MAX_STEPS_MESSAGE: &str = "任务已达到最大步数限制，已终止";

/// 语义化错误恢复：将错误映射为可执行动作（重试提示 / 停止 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::ExecutionFailed(_) | AgentError::ParseError(_) => {
                RecoveryAction::RetryWithPrompt(LAST_ACTION_FAILED_PROMPT.to_string())
            }
            AgentError::Cancelled => RecoveryAction::Stop,
            AgentError::BudgetExhausted { .. } => {
                RecoveryAction::Abort(MAX_STEPS_MESSAGE.to_string())
            }
            AgentError::CaptureFailed(_) => RecoveryAction::Abort("截屏失败".to_string()),
            AgentError::ExecutorUnavailable => {
                RecoveryAction::Abort("动作执行器不可用，请检查无障碍服务".to_string())
            }
            // 模型错误哨兵原样展示，便于用户判断是网络还是鉴权问题
            AgentError::ModelError(msg) => RecoveryAction::Abort(msg.clone()),
            other => RecoveryAction::Abort(other.to_string()),
        }
    }
}
