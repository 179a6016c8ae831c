//! 任务内对话历史
//!
//! 每个任务开始时清空并写入唯一一条 system 消息；每步追加 user（截图 + 屏幕信息）与 assistant（思考 + 动作）。
//! 模型回复后，已被回答的 user 消息中的图片会被剥离，只保留文本，控制上下文增长。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::device::Screenshot;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 多模态消息中的一段内容
#[derive(Clone, Debug)]
pub enum ContentPart {
    Image(Arc<Screenshot>),
    Text(String),
}

impl ContentPart {
    pub fn is_image(&self) -> bool {
        matches!(self, ContentPart::Image(_))
    }
}

/// 消息内容：纯文本或多段内容
#[derive(Clone, Debug)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// 单条消息
#[derive(Clone, Debug)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    /// user 多模态消息：图片在前、文本在后
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    pub fn has_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts.iter().any(ContentPart::is_image),
        }
    }

    /// 拼接所有文本内容（图片忽略）
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text(t) => Some(t.as_str()),
                    ContentPart::Image(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// 去掉图片段，保留文本段；返回是否有改动
    fn strip_images(&mut self) -> bool {
        match &mut self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => {
                let before = parts.len();
                parts.retain(|p| !p.is_image());
                parts.len() != before
            }
        }
    }
}

/// 单个任务的对话历史（仅编排循环读写）
#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新任务：清空并写入唯一的 system 消息
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(system_prompt));
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 含图片的消息条数
    pub fn image_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.has_image()).count()
    }

    /// 剥离最后一条 assistant 之前所有 user 消息中的图片，返回被修改的条数。
    ///
    /// 正常流程下只有倒数第二条（刚被回答的 user 消息）含图；若上一步执行失败，
    /// 末尾还会多一条纠错 user 消息，此时同样能找到被回答的那条。对无图历史重复调用不做任何修改。
    pub fn strip_answered_images(&mut self) -> usize {
        let Some(last_assistant) = self
            .messages
            .iter()
            .rposition(|m| m.role == Role::Assistant)
        else {
            return 0;
        };
        self.messages[..last_assistant]
            .iter_mut()
            .filter(|m| m.role == Role::User)
            .map(|m| m.strip_images())
            .filter(|changed| *changed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ImageFormat;

    fn image() -> ContentPart {
        ContentPart::Image(Arc::new(Screenshot::new(
            4,
            4,
            ImageFormat::Png,
            vec![1u8, 2, 3],
        )))
    }

    fn step_user(text: &str) -> Message {
        Message::user_parts(vec![image(), ContentPart::Text(text.to_string())])
    }

    #[test]
    fn test_reset_keeps_single_system_message() {
        let mut history = ConversationHistory::new();
        history.reset("sys A");
        history.push(Message::user("hi"));
        history.reset("sys B");
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].role, Role::System);
        assert_eq!(history.messages()[0].text(), "sys B");
    }

    #[test]
    fn test_strip_previous_user_turn_keeps_text() {
        let mut history = ConversationHistory::new();
        history.reset("sys");
        history.push(step_user("screen 1"));
        history.push(Message::assistant("tap"));

        assert_eq!(history.strip_answered_images(), 1);
        assert_eq!(history.image_message_count(), 0);
        assert_eq!(history.messages()[1].text(), "screen 1");
    }

    #[test]
    fn test_strip_after_failure_feedback() {
        let mut history = ConversationHistory::new();
        history.reset("sys");
        history.push(step_user("screen 1"));
        history.push(Message::assistant("tap"));
        history.push(Message::user("上一步操作执行失败"));

        assert_eq!(history.strip_answered_images(), 1);
        assert_eq!(history.image_message_count(), 0);
    }

    #[test]
    fn test_unanswered_user_image_is_kept() {
        let mut history = ConversationHistory::new();
        history.reset("sys");
        history.push(step_user("screen 1"));
        history.push(Message::assistant("tap"));
        history.push(step_user("screen 2"));

        history.strip_answered_images();
        assert_eq!(history.image_message_count(), 1);
        assert!(history.last().unwrap().has_image());
    }

    #[test]
    fn test_strip_is_idempotent() {
        let mut history = ConversationHistory::new();
        history.reset("sys");
        history.push(step_user("screen 1"));
        history.push(Message::assistant("tap"));
        history.strip_answered_images();

        let before: Vec<String> = history.messages().iter().map(Message::text).collect();
        assert_eq!(history.strip_answered_images(), 0);
        let after: Vec<String> = history.messages().iter().map(Message::text).collect();
        assert_eq!(before, after);
    }
}
