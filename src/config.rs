//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PILOT__*` 覆盖（双下划线表示嵌套，如 `PILOT__AGENT__MAX_STEPS=30`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::action::ExecutorTiming;
use crate::react::LoopSettings;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub agent: AgentSection,
    pub executor: ExecutorSection,
    pub device: DeviceSection,
}

/// [app] 段：应用名、截图目录、system prompt 路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 截图保存目录
    pub image_dir: PathBuf,
    /// 未设置时查找 config/prompts/system.md，再退回内置提示词
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            image_dir: PathBuf::from("./screenshots"),
            system_prompt_path: None,
        }
    }
}

/// [agent] 段：步数上限与各类等待
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_steps: usize,
    pub step_delay_ms: u64,
    pub capture_timeout_ms: u64,
    /// 0 表示模型调用不设单独超时
    pub model_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: 20,
            step_delay_ms: 2000,
            capture_timeout_ms: 5000,
            model_timeout_secs: 0,
        }
    }
}

/// [executor] 段：动作执行后的稳定等待与手势时长
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub settle_ms: u64,
    pub double_tap_interval_ms: u64,
    pub launch_settle_ms: u64,
    pub long_press_ms: u64,
    pub swipe_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            double_tap_interval_ms: 150,
            launch_settle_ms: 2000,
            long_press_ms: 1000,
            swipe_ms: 1000,
        }
    }
}

/// [device] 段：dry-run 使用的模拟屏幕尺寸
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub width: i32,
    pub height: i32,
    /// 模拟设备上可启动的应用
    pub apps: Vec<String>,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 2400,
            apps: vec!["Settings".to_string()],
        }
    }
}

impl AppConfig {
    pub fn loop_settings(&self) -> LoopSettings {
        let a = &self.agent;
        LoopSettings {
            max_steps: a.max_steps,
            step_delay: Duration::from_millis(a.step_delay_ms),
            capture_timeout: Duration::from_millis(a.capture_timeout_ms),
            model_timeout: (a.model_timeout_secs > 0).then(|| Duration::from_secs(a.model_timeout_secs)),
        }
    }

    pub fn executor_timing(&self) -> ExecutorTiming {
        let e = &self.executor;
        ExecutorTiming {
            settle: Duration::from_millis(e.settle_ms),
            double_tap_interval: Duration::from_millis(e.double_tap_interval_ms),
            launch_settle: Duration::from_millis(e.launch_settle_ms),
            long_press: Duration::from_millis(e.long_press_ms),
            swipe: Duration::from_millis(e.swipe_ms),
        }
    }
}

/// 从 config 目录加载配置，环境变量 PILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PILOT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
