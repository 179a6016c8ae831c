//! 悬浮窗挂起守卫
//!
//! 截屏与手势需要屏幕无遮挡：先 suspend（隐藏并等待生效），操作完成后 restore。
//! restore 放在 Drop 中，成功、失败、取消（future 被丢弃）任一路径都会恢复。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::device::Overlay;

/// 作用域内保持悬浮窗隐藏
pub struct OverlaySuspension<'a> {
    overlay: &'a dyn Overlay,
}

impl<'a> OverlaySuspension<'a> {
    pub async fn acquire(overlay: &'a dyn Overlay) -> OverlaySuspension<'a> {
        // 先构造守卫再等待隐藏：等待期间被取消也会恢复
        let guard = OverlaySuspension { overlay };
        overlay.suspend().await;
        guard
    }
}

impl Drop for OverlaySuspension<'_> {
    fn drop(&mut self) {
        self.overlay.restore();
    }
}

/// 无悬浮窗（无界面运行、测试）
#[derive(Debug, Default)]
pub struct NoOverlay;

#[async_trait]
impl Overlay for NoOverlay {
    async fn suspend(&self) {}

    fn restore(&self) {}
}

/// 记录挂起/恢复次数的悬浮窗，用于测试与 dry-run
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    suspends: AtomicUsize,
    restores: AtomicUsize,
    hidden: AtomicBool,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend_count(&self) -> usize {
        self.suspends.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Overlay for RecordingOverlay {
    async fn suspend(&self) {
        self.suspends.fetch_add(1, Ordering::SeqCst);
        self.hidden.store(true, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }

    fn restore(&self) {
        self.restores.fetch_add(1, Ordering::SeqCst);
        self.hidden.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_suspension_restores_on_scope_exit() {
        let overlay = RecordingOverlay::new();
        {
            let _guard = OverlaySuspension::acquire(&overlay).await;
            assert!(overlay.is_hidden());
        }
        assert!(!overlay.is_hidden());
        assert_eq!(overlay.suspend_count(), 1);
        assert_eq!(overlay.restore_count(), 1);
    }

    #[tokio::test]
    async fn test_suspension_restores_when_cancelled() {
        let overlay = RecordingOverlay::new();
        let op = async {
            let _guard = OverlaySuspension::acquire(&overlay).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        };
        let res = tokio::time::timeout(Duration::from_millis(20), op).await;
        assert!(res.is_err());
        assert!(!overlay.is_hidden());
        assert_eq!(overlay.restore_count(), 1);
    }
}
