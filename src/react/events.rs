//! 状态事件：编排循环推送给 UI 协作者的状态文本与语义状态

use serde::Serialize;

/// 助手语义状态（决定悬浮窗 / 状态栏的样式）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantState {
    Idle,
    Processing,
    Success,
    Error,
}

/// 单条状态事件（可序列化为 JSON 供前端展示）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// 状态文本更新
    Status { text: String, state: AssistantState },
    /// 任务开始 / 结束
    TaskRunning { running: bool },
}
