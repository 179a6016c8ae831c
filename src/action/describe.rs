//! 动作的人类可读描述（状态栏与日志使用）

use std::collections::BTreeMap;

use crate::action::{Action, ActionType, ParsedAction};

/// 按类型与原始参数生成描述；参数缺失时退化为只含类型的描述
pub fn describe(action_type: ActionType, params: Option<&BTreeMap<String, String>>) -> String {
    let get = |key: &str| params.and_then(|p| p.get(key)).map(String::as_str);
    match action_type {
        ActionType::Tap => with_arg("点击", get("element")),
        ActionType::DoubleTap => with_arg("双击", get("element")),
        ActionType::LongPress => with_arg("长按", get("element")),
        ActionType::Swipe => match (get("start"), get("end")) {
            (Some(start), Some(end)) => format!("从 {} 滑动到 {}", start, end),
            _ => "滑动".to_string(),
        },
        ActionType::Type => with_quoted("输入文本", get("text")),
        ActionType::TypeName => with_quoted("输入名称", get("text")),
        ActionType::Launch => with_arg("启动应用", get("app")),
        ActionType::Back => "返回".to_string(),
        ActionType::Home => "回到桌面".to_string(),
        ActionType::Wait => with_arg("等待", get("duration")),
        ActionType::Finish => match get("message") {
            Some(msg) if !msg.is_empty() => format!("任务完成: {}", msg),
            _ => "任务完成".to_string(),
        },
        ActionType::TakeOver => with_arg("请求人工接管", get("message")),
        ActionType::Interact => "需要用户交互".to_string(),
        ActionType::Note => "记录页面内容".to_string(),
        ActionType::CallApi => with_arg("调用接口", get("instruction")),
        ActionType::Unknown => "未知操作".to_string(),
    }
}

pub fn describe_parsed(parsed: &ParsedAction) -> String {
    describe(parsed.action_type, Some(&parsed.raw_params))
}

/// 可执行动作的描述（坐标为绝对像素）
pub fn describe_action(action: &Action) -> String {
    match action {
        Action::Tap { x, y } => format!("点击 ({}, {})", x, y),
        Action::DoubleTap { x, y } => format!("双击 ({}, {})", x, y),
        Action::LongPress { x, y } => format!("长按 ({}, {})", x, y),
        Action::Swipe {
            start_x,
            start_y,
            end_x,
            end_y,
        } => format!("从 ({}, {}) 滑动到 ({}, {})", start_x, start_y, end_x, end_y),
        Action::TypeText { text } => format!("输入文本 \"{}\"", text),
        Action::Launch { app } => format!("启动应用 {}", app),
        Action::Wait { duration_ms } => format!("等待 {:.1} 秒", *duration_ms as f64 / 1000.0),
        Action::Finish { message } if !message.is_empty() => format!("任务完成: {}", message),
        Action::Error { reason } => format!("无法解析的动作: {}", reason),
        other => describe(other.action_type(), None),
    }
}

fn with_arg(label: &str, arg: Option<&str>) -> String {
    match arg {
        Some(a) if !a.is_empty() => format!("{} {}", label, a),
        _ => label.to_string(),
    }
}

fn with_quoted(label: &str, arg: Option<&str>) -> String {
    match arg {
        Some(a) => format!("{} \"{}\"", label, a),
        None => label.to_string(),
    }
}
