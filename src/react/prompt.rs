//! 提示词构建：system 消息、每步 user 文本、屏幕信息与回复反转义

use std::path::Path;

use chrono::{DateTime, Local};

/// 未找到提示词文件时使用的内置 system prompt（描述动作语法）
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"你是一个手机操作助手。每一步你会看到当前屏幕截图与屏幕信息，请先简要说明你的思考，然后输出且只输出一个动作：

- do(action="Launch", app="应用名")            启动应用
- do(action="Tap", element=[x, y])              点击
- do(action="Double Tap", element=[x, y])       双击
- do(action="Long Press", element=[x, y])       长按
- do(action="Swipe", start=[x1, y1], end=[x2, y2])  滑动
- do(action="Type", text="内容")                 在当前输入框输入文本
- do(action="Back")                             返回
- do(action="Home")                             回到桌面
- do(action="Wait", duration="2 seconds")       等待页面加载
- finish(message="结果说明")                     任务完成

坐标使用 0-1000 的相对坐标系，左上角为 (0, 0)，右下角为 (1000, 1000)。
element 也可以是元素框 [y1, x1, y2, x2]，此时点击框的中心。
如果上一步操作失败，请观察屏幕后换一种方式继续。"#;

/// 状态栏「思考中」文本
pub const THINKING_STATUS: &str = "思考中...";

/// 前台应用未知时使用的名称
pub const UNKNOWN_APP: &str = "Unknown";

const PROMPT_SEARCH_PATHS: [&str; 2] = ["config/prompts/system.md", "../config/prompts/system.md"];

/// 读取 system prompt：显式路径 > config/prompts/system.md > 内置
pub fn load_system_prompt(explicit: Option<&Path>) -> String {
    let from_explicit = explicit.and_then(|p| match std::fs::read_to_string(p) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(path = %p.display(), error = %e, "System prompt not readable, falling back");
            None
        }
    });
    from_explicit
        .or_else(|| {
            PROMPT_SEARCH_PATHS
                .into_iter()
                .find_map(|p| std::fs::read_to_string(p).ok())
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

/// 日期行 + system prompt
pub fn system_message(prompt: &str, now: DateTime<Local>) -> String {
    format!("{}\n{}", now.format("%Y年%m月%d日 %A"), prompt)
}

/// 屏幕信息 JSON：{"current_app": "..."}
pub fn screen_info(current_app: Option<&str>) -> String {
    serde_json::json!({ "current_app": current_app.unwrap_or(UNKNOWN_APP) }).to_string()
}

/// 第 1 步附带任务指令，之后只有屏幕信息
pub fn build_user_text(step: usize, instruction: &str, screen_info: &str) -> String {
    if step == 1 {
        format!("{}\n\n{}", instruction, screen_info)
    } else {
        format!("** Screen Info **\n\n{}", screen_info)
    }
}

/// 反转义模型回复中的字面转义序列：\n \t \r \" \\
///
/// 单遍扫描，`\\n` 得到 `\n` 两个字符而不是换行。
pub fn unescape_response(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let replaced = match chars.peek() {
            Some('n') => Some('\n'),
            Some('t') => Some('\t'),
            Some('r') => Some('\r'),
            Some('"') => Some('"'),
            Some('\\') => Some('\\'),
            _ => None,
        };
        match replaced {
            Some(r) => {
                out.push(r);
                chars.next();
            }
            None => out.push(c),
        }
    }
    out
}
