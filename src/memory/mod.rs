//! 记忆层：单任务内的对话历史（不跨任务持久化）

pub mod conversation;

pub use conversation::{ContentPart, ConversationHistory, Message, MessageContent, Role};
