//! 视觉语言模型抽象
//!
//! 后端实现 VisionModel：输入当前任务的完整对话历史与本步截图，返回模型原始回复文本。
//! 网络层的请求格式不属于核心，由具体实现负责。

use async_trait::async_trait;

use crate::device::Screenshot;
use crate::memory::Message;

/// 模型返回以此前缀开头的文本视为错误哨兵
pub const ERROR_SENTINEL_PREFIX: &str = "Error";

/// 视觉语言模型：infer 可被取消（调用方丢弃 future 即可）
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// 返回原始回复；Err 为调用失败原因
    async fn infer(&self, messages: &[Message], image: Option<&Screenshot>) -> Result<String, String>;

    /// 模型名称（日志用）
    fn name(&self) -> &str {
        "vision-model"
    }
}

/// 回复是否为错误哨兵
pub fn is_error_sentinel(response: &str) -> bool {
    response.trim_start().starts_with(ERROR_SENTINEL_PREFIX)
}
