//! 脚本化模型（用于测试与 dry-run，无需 API）
//!
//! 按顺序返回预设回复；脚本耗尽后返回默认回复（未设置时返回错误哨兵）。
//! 每次调用记录历史长度、含图消息数与是否带截图，便于断言编排循环的行为。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::device::Screenshot;
use crate::llm::VisionModel;
use crate::memory::{Message, Role};

/// 模型收到的一次调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCall {
    pub message_count: usize,
    pub image_messages: usize,
    pub had_image: bool,
    pub last_user_text: String,
}

/// 脚本化模型
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    latency: Duration,
    calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// 每次都返回同一回复
    pub fn repeating(response: impl Into<String>) -> Self {
        Self::default().with_fallback(response)
    }

    /// 脚本耗尽后使用的回复
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 追加一次调用失败
    pub fn push_failure(&self, reason: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(reason.into()));
        }
    }

    /// dry-run 演示脚本：打开设置、进入搜索、输入、完成
    pub fn demo() -> Self {
        Self::new([
            r#"当前在桌面，先打开设置应用。 do(action="Launch", app="Settings")"#,
            r#"设置已打开，点击顶部搜索框。 do(action="Tap", element=[500, 80])"#,
            r#"搜索框已聚焦，输入关键词。 do(action="Type", text="蓝牙")"#,
            r#"向上滑动查看结果。 do(action="Swipe", start=[500, 800], end=[500, 300])"#,
            r#"已找到蓝牙设置项。 finish(message="已在设置中找到蓝牙选项")"#,
        ])
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn record(&self, messages: &[Message], image: Option<&Screenshot>) {
        let call = ModelCall {
            message_count: messages.len(),
            image_messages: messages.iter().filter(|m| m.has_image()).count(),
            had_image: image.is_some(),
            last_user_text: messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(Message::text)
                .unwrap_or_default(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    async fn infer(&self, messages: &[Message], image: Option<&Screenshot>) -> Result<String, String> {
        self.record(messages, image);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(response) => response,
            None => Ok(self
                .fallback
                .clone()
                .unwrap_or_else(|| "Error: scripted responses exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
