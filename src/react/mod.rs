//! 认知层：提示词、状态推送与任务步进主循环

pub mod events;
pub mod loop_;
pub mod prompt;
pub mod status;

pub use events::{AssistantState, StatusEvent};
pub use loop_::{run_task, LoopSettings, StepSession, TaskOutcome, TaskReport};
pub use prompt::{
    build_user_text, load_system_prompt, screen_info, system_message, unescape_response,
    DEFAULT_SYSTEM_PROMPT, THINKING_STATUS,
};
pub use status::{ChannelStatusSink, NoopStatusSink, RecordingStatusSink, StatusSink};
