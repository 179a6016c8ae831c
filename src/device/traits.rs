//! 外部协作者 trait
//!
//! Device：手势与全局导航；ScreenCapture：带超时的截屏；ImageStore：截图落盘；Overlay：悬浮窗隐藏/恢复。
//! 所有方法以 bool / Option 表示成败，不向核心抛出 panic。

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::device::Screenshot;

/// 设备操作：坐标均为绝对像素
#[async_trait]
pub trait Device: Send + Sync {
    /// 手势后端（如无障碍服务）是否已连接
    fn is_available(&self) -> bool {
        true
    }

    fn screen_width(&self) -> i32;

    fn screen_height(&self) -> i32;

    /// 当前前台应用标识（包名或名称），未知时返回 None
    fn current_app(&self) -> Option<String> {
        None
    }

    /// 控制端自身是否处于前台
    fn is_host_foreground(&self) -> bool {
        false
    }

    async fn tap(&self, x: i32, y: i32) -> bool;

    async fn long_press(&self, x: i32, y: i32, duration: Duration) -> bool;

    async fn swipe(
        &self,
        start_x: i32,
        start_y: i32,
        end_x: i32,
        end_y: i32,
        duration: Duration,
    ) -> bool;

    /// 向当前焦点输入框写入文本
    async fn type_text(&self, text: &str) -> bool;

    fn global_back(&self) -> bool;

    fn global_home(&self) -> bool;

    /// 解析应用标识并启动；无法解析时返回 false 且不产生副作用
    async fn resolve_and_launch(&self, app: &str) -> bool;
}

/// 截屏：不得阻塞超过 timeout，None 表示失败
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self, timeout: Duration) -> Option<Screenshot>;
}

/// 截图持久化：失败返回 None，调用方仅记录日志
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, shot: &Screenshot) -> Option<PathBuf>;
}

/// 悬浮窗：截屏与手势前必须隐藏，操作结束后恢复
#[async_trait]
pub trait Overlay: Send + Sync {
    /// 隐藏悬浮窗并等待隐藏生效
    async fn suspend(&self);

    /// 恢复显示；不等待，可在 Drop 中调用
    fn restore(&self);
}
