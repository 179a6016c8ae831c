//! 展示用解析结果：保留模型原始写法（raw）与类型化取值（normalized）

use std::collections::BTreeMap;

use serde::Serialize;

use crate::action::ActionType;

/// 类型化参数：字符串或数字列表
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    List(Vec<f64>),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(t) => Some(t),
            ParamValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            ParamValue::List(l) => Some(l),
            ParamValue::Text(_) => None,
        }
    }
}

/// 解析后的动作（供 UI / 日志展示，不参与执行）
///
/// normalized_params 中的每个 key 在 raw_params 中都有对应项；
/// 列表参数的 raw 值会重新渲染为 `[500, 750]` 形式。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedAction {
    pub action_type: ActionType,
    pub raw_params: BTreeMap<String, String>,
    pub normalized_params: BTreeMap<String, ParamValue>,
}

impl ParsedAction {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            raw_params: BTreeMap::new(),
            normalized_params: BTreeMap::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.raw_params.get(key).map(String::as_str)
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.raw_params.contains_key(key) || self.normalized_params.contains_key(key)
    }

    pub fn list(&self, key: &str) -> Option<&[f64]> {
        self.normalized_params.get(key).and_then(ParamValue::as_list)
    }
}
