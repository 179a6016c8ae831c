//! 模拟设备与截屏（用于 dry-run 与测试，无需真机）
//!
//! SimulatedDevice 记录每次调用，可配置已安装应用、前台状态、手势失败与延迟；
//! SimulatedCapture 返回固定尺寸的空白截图，可配置失败与延迟。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::device::{Device, ImageFormat, ScreenCapture, Screenshot};

const LAUNCHER_APP: &str = "com.android.launcher";

/// 模拟设备收到的一次调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Tap { x: i32, y: i32 },
    LongPress { x: i32, y: i32, duration_ms: u64 },
    Swipe { start_x: i32, start_y: i32, end_x: i32, end_y: i32, duration_ms: u64 },
    TypeText(String),
    Back,
    Home,
    Launch(String),
}

/// 模拟设备
#[derive(Debug)]
pub struct SimulatedDevice {
    width: i32,
    height: i32,
    installed_apps: Vec<String>,
    host_foreground: bool,
    gesture_latency: Duration,
    available: AtomicBool,
    fail_gestures: AtomicBool,
    current_app: Mutex<Option<String>>,
    calls: Mutex<Vec<DeviceCall>>,
}

impl SimulatedDevice {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            installed_apps: Vec::new(),
            host_foreground: false,
            gesture_latency: Duration::ZERO,
            available: AtomicBool::new(true),
            fail_gestures: AtomicBool::new(false),
            current_app: Mutex::new(Some(LAUNCHER_APP.to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 可通过 Launch 启动的应用（大小写不敏感匹配）
    pub fn with_apps(mut self, apps: Vec<String>) -> Self {
        self.installed_apps = apps;
        self
    }

    pub fn with_host_foreground(mut self, foreground: bool) -> Self {
        self.host_foreground = foreground;
        self
    }

    pub fn with_gesture_latency(mut self, latency: Duration) -> Self {
        self.gesture_latency = latency;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 之后的手势（点击、长按、滑动）全部返回失败
    pub fn set_fail_gestures(&self, fail: bool) {
        self.fail_gestures.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: DeviceCall) {
        tracing::debug!(?call, "simulated device");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn set_current_app(&self, app: &str) {
        if let Ok(mut current) = self.current_app.lock() {
            *current = Some(app.to_string());
        }
    }

    async fn gesture(&self, call: DeviceCall) -> bool {
        if !self.gesture_latency.is_zero() {
            tokio::time::sleep(self.gesture_latency).await;
        }
        self.record(call);
        !self.fail_gestures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Device for SimulatedDevice {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn screen_width(&self) -> i32 {
        self.width
    }

    fn screen_height(&self) -> i32 {
        self.height
    }

    fn current_app(&self) -> Option<String> {
        self.current_app.lock().ok().and_then(|c| c.clone())
    }

    fn is_host_foreground(&self) -> bool {
        self.host_foreground
    }

    async fn tap(&self, x: i32, y: i32) -> bool {
        self.gesture(DeviceCall::Tap { x, y }).await
    }

    async fn long_press(&self, x: i32, y: i32, duration: Duration) -> bool {
        self.gesture(DeviceCall::LongPress {
            x,
            y,
            duration_ms: duration.as_millis() as u64,
        })
        .await
    }

    async fn swipe(
        &self,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        duration: Duration,
    ) -> bool {
        self.gesture(DeviceCall::Swipe {
            start_x,
            start_y,
            end_x,
            end_y,
            duration_ms: duration.as_millis() as u64,
        })
        .await
    }

    async fn type_text(&self, text: &str) -> bool {
        self.record(DeviceCall::TypeText(text.to_string()));
        true
    }

    fn global_back(&self) -> bool {
        self.record(DeviceCall::Back);
        true
    }

    fn global_home(&self) -> bool {
        self.record(DeviceCall::Home);
        self.set_current_app(LAUNCHER_APP);
        true
    }

    async fn resolve_and_launch(&self, app: &str) -> bool {
        let wanted = app.trim().to_lowercase();
        let Some(found) = self
            .installed_apps
            .iter()
            .find(|a| a.to_lowercase() == wanted)
            .cloned()
        else {
            return false;
        };
        self.record(DeviceCall::Launch(found.clone()));
        self.set_current_app(&found);
        true
    }
}

/// 模拟截屏
#[derive(Debug)]
pub struct SimulatedCapture {
    width: u32,
    height: u32,
    latency: Duration,
    fail: AtomicBool,
    count: AtomicUsize,
}

impl SimulatedCapture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            latency: Duration::ZERO,
            fail: AtomicBool::new(false),
            count: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// 已完成的截屏次数（含失败）
    pub fn capture_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapture for SimulatedCapture {
    async fn capture(&self, timeout: Duration) -> Option<Screenshot> {
        if self.latency > timeout {
            tokio::time::sleep(timeout).await;
            self.count.fetch_add(1, Ordering::SeqCst);
            return None;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return None;
        }
        // 内容无关紧要，只需非空
        let data = vec![0u8; 16];
        Some(Screenshot::new(self.width, self.height, ImageFormat::Png, data))
    }
}
