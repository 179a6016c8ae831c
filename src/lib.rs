//! Phone Pilot - 视觉语言模型驱动的设备操作智能体
//!
//! 模块划分：
//! - **action**: 动作词表、模型回复解析、动作描述与执行器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、状态投影、会话监管、组件装配、任务编排
//! - **device**: 设备 / 截屏 / 悬浮窗 / 截图存储协作者抽象与模拟实现
//! - **llm**: 视觉语言模型抽象与脚本化实现
//! - **memory**: 单任务对话历史
//! - **observability**: 日志初始化
//! - **react**: 提示词、状态推送与任务步进主循环

pub mod action;
pub mod config;
pub mod core;
pub mod device;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;

pub use crate::action::{Action, ActionType, ParsedAction};
pub use crate::core::{AgentBuilder, AgentError, Orchestrator};
pub use crate::react::{TaskOutcome, TaskReport};
