//! 模型层：视觉语言模型抽象与脚本化实现

pub mod mock;
pub mod traits;

pub use mock::{ModelCall, ScriptedModel};
pub use traits::{is_error_sentinel, VisionModel, ERROR_SENTINEL_PREFIX};
