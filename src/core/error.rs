//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt（回写失败提示）/ Stop（静默停止）/ Abort（报错终止）。

use thiserror::Error;

/// 单个任务运行过程中可能出现的错误（截屏、模型、解析、执行、取消、步数耗尽等）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// 截屏失败或超时；任务内不重试
    #[error("Screenshot capture failed: {0}")]
    CaptureFailed(String),

    /// 模型返回错误哨兵文本（"Error..."）或调用本身失败
    #[error("Model error: {0}")]
    ModelError(String),

    /// 模型回复中的动作无法解析；与执行失败一样回写给模型
    #[error("Action parse error: {0}")]
    ParseError(String),

    /// 动作执行返回 false；可恢复，作为纠错上下文回写给模型
    #[error("Action execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Action executor unavailable")]
    ExecutorUnavailable,

    /// 用户停止或被新任务替换；属于正常结束，不向用户报错
    #[error("Task cancelled")]
    Cancelled,

    #[error("Step budget exhausted after {max_steps} steps")]
    BudgetExhausted { max_steps: usize },

    #[error("Instruction is empty")]
    EmptyInstruction,

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 追加一条 user 消息说明上一步失败，让模型在下一步自行纠正
    RetryWithPrompt(String),
    /// 静默停止（用户取消）
    Stop,
    /// 终止当前任务并向用户展示错误
    Abort(String),
}
