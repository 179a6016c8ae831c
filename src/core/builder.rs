//! Agent 构建器：统一的组件装配
//!
//! 协作者（模型、设备、截屏、悬浮窗、截图存储、UI 状态）通过构造注入，不使用全局单例。
//! 未指定的可选协作者使用 NoOverlay / NoopImageStore / NoopStatusSink。

use std::sync::Arc;

use crate::action::{ActionExecutor, ExecutorTiming};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::device::{Device, FileImageStore, ImageStore, NoOverlay, NoopImageStore, Overlay, ScreenCapture};
use crate::llm::VisionModel;
use crate::react::{load_system_prompt, LoopSettings, NoopStatusSink, StatusSink, DEFAULT_SYSTEM_PROMPT};

/// 装配完成的组件（廉价 Clone，每个任务持有一份）
#[derive(Clone)]
pub struct AgentComponents {
    pub model: Arc<dyn VisionModel>,
    pub device: Arc<dyn Device>,
    pub capture: Arc<dyn ScreenCapture>,
    pub overlay: Arc<dyn Overlay>,
    pub image_store: Arc<dyn ImageStore>,
    pub status: Arc<dyn StatusSink>,
    pub executor: Arc<ActionExecutor>,
    pub settings: LoopSettings,
    pub system_prompt: String,
}

/// Agent 构建器
pub struct AgentBuilder {
    model: Option<Arc<dyn VisionModel>>,
    device: Option<Arc<dyn Device>>,
    capture: Option<Arc<dyn ScreenCapture>>,
    overlay: Arc<dyn Overlay>,
    image_store: Arc<dyn ImageStore>,
    status: Arc<dyn StatusSink>,
    timing: ExecutorTiming,
    settings: LoopSettings,
    system_prompt: String,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            device: None,
            capture: None,
            overlay: Arc::new(NoOverlay),
            image_store: Arc::new(NoopImageStore),
            status: Arc::new(NoopStatusSink),
            timing: ExecutorTiming::default(),
            settings: LoopSettings::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// 从配置读取循环参数、执行器时长、截图目录与 system prompt
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new()
            .with_settings(cfg.loop_settings())
            .with_timing(cfg.executor_timing())
            .with_image_store(Arc::new(FileImageStore::new(&cfg.app.image_dir)))
            .with_system_prompt(load_system_prompt(cfg.app.system_prompt_path.as_deref()))
    }

    pub fn with_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_device(mut self, device: Arc<dyn Device>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn ScreenCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_overlay(mut self, overlay: Arc<dyn Overlay>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_image_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.image_store = store;
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn with_timing(mut self, timing: ExecutorTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 缺少模型、设备或截屏协作者时返回 ConfigError
    pub fn build(self) -> Result<AgentComponents, AgentError> {
        let model = self
            .model
            .ok_or_else(|| AgentError::ConfigError("vision model not set".to_string()))?;
        let device = self
            .device
            .ok_or_else(|| AgentError::ConfigError("device not set".to_string()))?;
        let capture = self
            .capture
            .ok_or_else(|| AgentError::ConfigError("screen capture not set".to_string()))?;
        if self.settings.max_steps == 0 {
            return Err(AgentError::ConfigError("max_steps must be at least 1".to_string()));
        }

        let executor = Arc::new(ActionExecutor::new(
            device.clone(),
            self.overlay.clone(),
            self.timing,
        ));
        Ok(AgentComponents {
            model,
            device,
            capture,
            overlay: self.overlay,
            image_store: self.image_store,
            status: self.status,
            executor,
            settings: self.settings,
            system_prompt: self.system_prompt,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
