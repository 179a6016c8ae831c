//! 动作文本解析
//!
//! 模型回复形如 `思考内容 do(action="Tap", element=[500, 750])` 或 `finish(message="...")`：
//! 1. extract_response_parts 切出思考文本与第一个括号配平的 do(...) / finish(...)；
//! 2. parse_action 把动作串解析为可执行 Action（坐标换算为绝对像素）；
//! 3. parse_response 解析为展示用 ParsedAction（保留原始参数）。
//!
//! 解析器是纯函数：不做 I/O，相同输入与屏幕尺寸总是得到相同结果。
//! 只取第一个完整调用，其后的文本（包括第二个 do(...)）被丢弃。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::action::{Action, ActionType, ParamValue, ParsedAction};

/// 模型坐标使用的逻辑网格大小（每个轴 0-1000）
pub const LOGICAL_GRID: f64 = 1000.0;

/// Wait 未给出或无法解析时长时的默认值（秒）
const DEFAULT_WAIT_SECS: f64 = 1.0;

static CALL_START_RE: OnceLock<Regex> = OnceLock::new();
static FINISH_RE: OnceLock<Regex> = OnceLock::new();
static DO_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
static STRING_PARAM_RE: OnceLock<Regex> = OnceLock::new();
static LIST_PARAM_RE: OnceLock<Regex> = OnceLock::new();

fn call_start_re() -> &'static Regex {
    CALL_START_RE.get_or_init(|| Regex::new(r"(?i)(do|finish)\(").unwrap())
}

fn finish_re() -> &'static Regex {
    FINISH_RE.get_or_init(|| {
        Regex::new(r#"(?is)^finish\(\s*(?:message\s*=\s*)?(?:"(.*?)"|'(.*?)')?\s*\)"#).unwrap()
    })
}

fn do_prefix_re() -> &'static Regex {
    DO_PREFIX_RE.get_or_init(|| Regex::new(r"(?i)^do\(").unwrap())
}

fn string_param_re() -> &'static Regex {
    STRING_PARAM_RE.get_or_init(|| Regex::new(r#"(?s)(\w+)\s*=\s*(?:"(.*?)"|'(.*?)')"#).unwrap())
}

fn list_param_re() -> &'static Regex {
    LIST_PARAM_RE.get_or_init(|| Regex::new(r"(\w+)\s*=\s*[\[\(]([^\[\]\(\)]*)[\]\)]").unwrap())
}

/// 定位第一个调用关键字；关键字与 '(' 之间不能有空白（`do (x)` 是普通文本），
/// 关键字前不能紧跟标识符字符（`undo(` 不算 `do(`）
fn find_call_start(text: &str) -> Option<(usize, usize)> {
    call_start_re().find_iter(text).find_map(|m| {
        let prev = text[..m.start()].chars().next_back();
        match prev {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
            // 匹配以 '(' 结尾，open 为其字节位置
            _ => Some((m.start(), m.end() - 1)),
        }
    })
}

/// 从 open（'(' 的位置）开始按深度计数寻找配对的 ')'
fn find_matching_parenthesis(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// 拆分模型回复为 (思考文本, 动作串)。未找到调用时整段都是思考，动作串为空。
pub fn extract_response_parts(content: &str) -> (String, String) {
    let trimmed = content.trim();
    let Some((start, open)) = find_call_start(trimmed) else {
        return (trimmed.to_string(), String::new());
    };
    let reasoning = trimmed[..start].trim().to_string();
    // 找不到配对括号（回复被截断）时动作串延伸到文本末尾
    let action = match find_matching_parenthesis(trimmed, open) {
        Some(close) => &trimmed[start..=close],
        None => &trimmed[start..],
    };
    (reasoning, action.trim().to_string())
}

/// 仅提取动作串（用于日志与历史），未找到时返回空串
pub fn extract_action_string(content: &str) -> String {
    extract_response_parts(content).1
}

/// 解析完整回复为展示用结果：(思考文本, ParsedAction)；无动作或缺少 action 键时为 None
pub fn parse_response(content: &str) -> (String, Option<ParsedAction>) {
    let (reasoning, action) = extract_response_parts(content);
    if action.is_empty() {
        return (reasoning, None);
    }
    (reasoning, parse_to_parsed_action(&action))
}

/// 解析动作串为 ParsedAction（展示用，不做坐标换算）
pub fn parse_to_parsed_action(action_string: &str) -> Option<ParsedAction> {
    let clean = action_string.trim();

    if let Some(message) = match_finish(clean) {
        let mut parsed = ParsedAction::new(ActionType::Finish);
        parsed.raw_params.insert("message".to_string(), message.clone());
        parsed
            .normalized_params
            .insert("message".to_string(), ParamValue::Text(message));
        return Some(parsed);
    }

    let args = match_do_args(clean)?;
    let (raw_params, normalized_params) = parse_action_params(args);
    let action_type = ActionType::from_name(raw_params.get("action")?);
    Some(ParsedAction {
        action_type,
        raw_params,
        normalized_params,
    })
}

/// 解析完整回复为可执行 Action（先提取动作串再解析）
pub fn parse(response: &str, screen_width: i32, screen_height: i32) -> Action {
    parse_action(&extract_action_string(response), screen_width, screen_height)
}

/// 解析动作串为可执行 Action；任何结构错误都得到带原因的 Action::Error，不会回退为默认动作
pub fn parse_action(action_string: &str, screen_width: i32, screen_height: i32) -> Action {
    let clean = action_string.trim();
    if clean.is_empty() {
        return Action::error("No action found in response");
    }

    if let Some(message) = match_finish(clean) {
        return Action::Finish { message };
    }

    let Some(args) = match_do_args(clean) else {
        return Action::error(format!("Unknown action format: {}", clean));
    };
    let (_, params) = parse_action_params(args);
    let Some(type_name) = params.get("action").and_then(ParamValue::as_text) else {
        return Action::error("Missing action type");
    };

    let screen = (screen_width, screen_height);
    let result = match ActionType::from_name(type_name) {
        ActionType::Tap => resolve_point(&params, "element", screen).map(|(x, y)| Action::Tap { x, y }),
        ActionType::DoubleTap => {
            resolve_point(&params, "element", screen).map(|(x, y)| Action::DoubleTap { x, y })
        }
        ActionType::LongPress => {
            resolve_point(&params, "element", screen).map(|(x, y)| Action::LongPress { x, y })
        }
        ActionType::Swipe => resolve_point(&params, "start", screen).and_then(|(sx, sy)| {
            resolve_point(&params, "end", screen).map(|(ex, ey)| Action::Swipe {
                start_x: sx,
                start_y: sy,
                end_x: ex,
                end_y: ey,
            })
        }),
        ActionType::Type | ActionType::TypeName => required_text(&params, "text", type_name)
            .map(|text| Action::TypeText { text }),
        ActionType::Launch => {
            required_text(&params, "app", type_name).map(|app| Action::Launch { app })
        }
        ActionType::Back => Ok(Action::Back),
        ActionType::Home => Ok(Action::Home),
        ActionType::Wait => Ok(Action::Wait {
            duration_ms: wait_duration_ms(params.get("duration").and_then(ParamValue::as_text)),
        }),
        ActionType::Finish => Ok(Action::Finish {
            message: params
                .get("message")
                .and_then(ParamValue::as_text)
                .unwrap_or_default()
                .to_string(),
        }),
        ActionType::TakeOver
        | ActionType::Interact
        | ActionType::Note
        | ActionType::CallApi
        | ActionType::Unknown => Ok(Action::Unknown),
    };
    result.unwrap_or_else(Action::error)
}

/// 统一参数提取：`key="value"` / `key='value'` 为字符串，`key=[n, n]` / `key=(n, n)` 为数字列表。
///
/// 返回 (原始参数, 类型化参数)。列表中任一元素不是数字时，类型化值保留为原文字符串，
/// 使用方据此报告格式错误。
pub fn parse_action_params(
    args: &str,
) -> (BTreeMap<String, String>, BTreeMap<String, ParamValue>) {
    let mut raw = BTreeMap::new();
    let mut normalized = BTreeMap::new();

    for caps in string_param_re().captures_iter(args) {
        let key = caps[1].to_string();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        raw.insert(key.clone(), value.clone());
        normalized.insert(key, ParamValue::Text(value));
    }

    for caps in list_param_re().captures_iter(args) {
        let key = caps[1].to_string();
        let inner = caps[2].trim();
        match parse_number_list(inner) {
            Some(list) => {
                raw.insert(key.clone(), render_list(&list));
                normalized.insert(key, ParamValue::List(list));
            }
            None => {
                let original = caps[0][caps[1].len()..].trim_start_matches(|c: char| c == '=' || c.is_whitespace());
                raw.insert(key.clone(), original.to_string());
                normalized.insert(key, ParamValue::Text(original.to_string()));
            }
        }
    }

    (raw, normalized)
}

/// 逻辑坐标 -> 绝对像素：round(logical / 1000 * dimension)
pub fn to_absolute(logical: f64, dimension: i32) -> i32 {
    (logical / LOGICAL_GRID * f64::from(dimension)).round() as i32
}

fn match_finish(clean: &str) -> Option<String> {
    finish_re().captures(clean).map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    })
}

/// `do(` 之后到最后一个 ')' 之前的参数串；缺少 ')'（回复被截断）时取到末尾
fn match_do_args(clean: &str) -> Option<&str> {
    let prefix = do_prefix_re().find(clean)?;
    let rest = &clean[prefix.end()..];
    Some(match rest.rfind(')') {
        Some(end) => &rest[..end],
        None => rest,
    })
}

fn parse_number_list(inner: &str) -> Option<Vec<f64>> {
    inner
        .split(',')
        .map(|s| s.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

/// 整数值渲染为 `500`，否则保留小数
fn render_list(list: &[f64]) -> String {
    let items: Vec<String> = list
        .iter()
        .map(|v| {
            if v.fract() == 0.0 {
                format!("{}", *v as i64)
            } else {
                format!("{}", v)
            }
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// 2 个值为点 [x, y]，4 个值为框 [y1, x1, y2, x2]（取中心），其余长度均为错误
fn resolve_point(
    params: &BTreeMap<String, ParamValue>,
    key: &str,
    (width, height): (i32, i32),
) -> Result<(i32, i32), String> {
    match params.get(key) {
        None => Err(format!("Missing `{}` coordinates", key)),
        Some(ParamValue::Text(raw)) => {
            Err(format!("Malformed coordinate list for `{}`: {}", key, raw))
        }
        Some(ParamValue::List(values)) => match values.as_slice() {
            [x, y] => Ok((to_absolute(*x, width), to_absolute(*y, height))),
            [y1, x1, y2, x2] => {
                let cx = (x1 + x2) / 2.0;
                let cy = (y1 + y2) / 2.0;
                Ok((to_absolute(cx, width), to_absolute(cy, height)))
            }
            other => Err(format!(
                "Invalid `{}` with {} value(s): expected [x, y] or [y1, x1, y2, x2]",
                key,
                other.len()
            )),
        },
    }
}

fn required_text(
    params: &BTreeMap<String, ParamValue>,
    key: &str,
    type_name: &str,
) -> Result<String, String> {
    params
        .get(key)
        .and_then(ParamValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| format!("Missing `{}` for {}", key, type_name))
}

/// "2 seconds" / "1.5" / "3s" -> 毫秒
fn wait_duration_ms(raw: Option<&str>) -> u64 {
    let secs = raw
        .map(|s| {
            s.trim()
                .trim_end_matches("seconds")
                .trim_end_matches("second")
                .trim_end_matches('s')
                .trim()
        })
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(DEFAULT_WAIT_SECS);
    (secs * 1000.0).round() as u64
}
