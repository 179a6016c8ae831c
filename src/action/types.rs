//! 动作词表：可执行的 Action 与展示用的 ActionType
//!
//! Action 的坐标一律为绝对像素，由解析器从 0-1000 逻辑网格换算得到，构造后不再修改。

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

/// 展示用动作类型（覆盖模型可能输出的全部类型，部分类型不可执行）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Tap,
    DoubleTap,
    LongPress,
    Swipe,
    Type,
    TypeName,
    Launch,
    Back,
    Home,
    Wait,
    Finish,
    TakeOver,
    Interact,
    Note,
    CallApi,
    Unknown,
}

impl ActionType {
    pub const ALL: [ActionType; 16] = [
        ActionType::Tap,
        ActionType::DoubleTap,
        ActionType::LongPress,
        ActionType::Swipe,
        ActionType::Type,
        ActionType::TypeName,
        ActionType::Launch,
        ActionType::Back,
        ActionType::Home,
        ActionType::Wait,
        ActionType::Finish,
        ActionType::TakeOver,
        ActionType::Interact,
        ActionType::Note,
        ActionType::CallApi,
        ActionType::Unknown,
    ];

    /// 模型提示词中使用的名称
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ActionType::Tap => "Tap",
            ActionType::DoubleTap => "Double Tap",
            ActionType::LongPress => "Long Press",
            ActionType::Swipe => "Swipe",
            ActionType::Type => "Type",
            ActionType::TypeName => "Type_Name",
            ActionType::Launch => "Launch",
            ActionType::Back => "Back",
            ActionType::Home => "Home",
            ActionType::Wait => "Wait",
            ActionType::Finish => "Finish",
            ActionType::TakeOver => "Take_over",
            ActionType::Interact => "Interact",
            ActionType::Note => "Note",
            ActionType::CallApi => "Call_API",
            ActionType::Unknown => "Unknown",
        }
    }

    /// 大小写不敏感，忽略空格、连字符、下划线："Double Tap" / "double_tap" / "DOUBLE-TAP" 等价
    pub fn from_name(name: &str) -> ActionType {
        let key = normalize_name(name);
        if key.is_empty() {
            return ActionType::Unknown;
        }
        type_map().get(&key).copied().unwrap_or(ActionType::Unknown)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

static TYPE_MAP: OnceLock<HashMap<String, ActionType>> = OnceLock::new();

fn type_map() -> &'static HashMap<String, ActionType> {
    TYPE_MAP.get_or_init(|| {
        ActionType::ALL
            .iter()
            .map(|t| (normalize_name(t.canonical_name()), *t))
            .collect()
    })
}

/// 可执行动作（封闭枚举，执行器对其穷举匹配）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Tap { x: i32, y: i32 },
    DoubleTap { x: i32, y: i32 },
    LongPress { x: i32, y: i32 },
    Swipe { start_x: i32, start_y: i32, end_x: i32, end_y: i32 },
    TypeText { text: String },
    Launch { app: String },
    Back,
    Home,
    Wait { duration_ms: u64 },
    /// 任务结束信号
    Finish { message: String },
    /// 解析失败，reason 供人排查
    Error { reason: String },
    Unknown,
}

impl Action {
    pub fn error(reason: impl Into<String>) -> Self {
        Action::Error {
            reason: reason.into(),
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Action::Tap { .. } => ActionType::Tap,
            Action::DoubleTap { .. } => ActionType::DoubleTap,
            Action::LongPress { .. } => ActionType::LongPress,
            Action::Swipe { .. } => ActionType::Swipe,
            Action::TypeText { .. } => ActionType::Type,
            Action::Launch { .. } => ActionType::Launch,
            Action::Back => ActionType::Back,
            Action::Home => ActionType::Home,
            Action::Wait { .. } => ActionType::Wait,
            Action::Finish { .. } => ActionType::Finish,
            Action::Error { .. } | Action::Unknown => ActionType::Unknown,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Action::Finish { .. })
    }

    /// 日志中使用的简短名称
    pub fn name(&self) -> &'static str {
        match self {
            Action::Tap { .. } => "tap",
            Action::DoubleTap { .. } => "double_tap",
            Action::LongPress { .. } => "long_press",
            Action::Swipe { .. } => "swipe",
            Action::TypeText { .. } => "type_text",
            Action::Launch { .. } => "launch",
            Action::Back => "back",
            Action::Home => "home",
            Action::Wait { .. } => "wait",
            Action::Finish { .. } => "finish",
            Action::Error { .. } => "error",
            Action::Unknown => "unknown",
        }
    }
}
