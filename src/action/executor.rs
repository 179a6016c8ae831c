//! 动作执行器
//!
//! 持有 Device 与 Overlay，execute(action) 把一个 Action 映射为一次设备调用，并负责调用顺序与稳定等待：
//! - 点击 / 长按 / 滑动：悬浮窗挂起期间执行手势，之后等待 settle；
//! - 双击：两次点击间隔 double_tap_interval，两次都成功才算成功；
//! - 启动应用：无法解析时直接失败，成功后等待更长的 launch_settle；
//! - Wait 只睡眠（可取消），Finish 恒成功，Error / Unknown 恒失败。
//!
//! 失败以 Ok(false) 表示；取消以 Err(Cancelled) 立即向上传播。每次执行输出一行 JSON 审计日志。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::action::{describe_action, Action};
use crate::core::AgentError;
use crate::device::{Device, Overlay, OverlaySuspension};

/// 执行器的各项等待时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorTiming {
    pub settle: Duration,
    pub double_tap_interval: Duration,
    pub launch_settle: Duration,
    pub long_press: Duration,
    pub swipe: Duration,
}

impl Default for ExecutorTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1000),
            double_tap_interval: Duration::from_millis(150),
            launch_settle: Duration::from_millis(2000),
            long_press: Duration::from_millis(1000),
            swipe: Duration::from_millis(1000),
        }
    }
}

impl ExecutorTiming {
    /// 全部为零（测试用）
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            double_tap_interval: Duration::ZERO,
            launch_settle: Duration::ZERO,
            long_press: Duration::ZERO,
            swipe: Duration::ZERO,
        }
    }
}

/// 可取消的睡眠：token 被取消时立即返回 Cancelled
pub async fn cancellable_sleep(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), AgentError> {
    if cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

pub struct ActionExecutor {
    device: Arc<dyn Device>,
    overlay: Arc<dyn Overlay>,
    timing: ExecutorTiming,
}

impl ActionExecutor {
    pub fn new(device: Arc<dyn Device>, overlay: Arc<dyn Overlay>, timing: ExecutorTiming) -> Self {
        Self {
            device,
            overlay,
            timing,
        }
    }

    pub fn timing(&self) -> &ExecutorTiming {
        &self.timing
    }

    /// 执行一个动作；Ok(bool) 为执行结果，Err 仅为 Cancelled 或 ExecutorUnavailable
    pub async fn execute(
        &self,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if touches_device(action) && !self.device.is_available() {
            self.audit(action, false, "unavailable", Duration::ZERO);
            return Err(AgentError::ExecutorUnavailable);
        }

        let start = Instant::now();
        let result = self.dispatch(action, cancel).await;
        let elapsed = start.elapsed();
        match &result {
            Ok(ok) => self.audit(action, *ok, if *ok { "ok" } else { "failed" }, elapsed),
            Err(AgentError::Cancelled) => self.audit(action, false, "cancelled", elapsed),
            Err(_) => self.audit(action, false, "error", elapsed),
        }
        result
    }

    async fn dispatch(&self, action: &Action, cancel: &CancellationToken) -> Result<bool, AgentError> {
        match action {
            Action::Tap { x, y } => {
                if !self.in_bounds(*x, *y) {
                    return Ok(false);
                }
                let ok = {
                    let _hidden = OverlaySuspension::acquire(self.overlay.as_ref()).await;
                    self.device.tap(*x, *y).await
                };
                self.settle(self.timing.settle, cancel).await?;
                Ok(ok)
            }
            Action::DoubleTap { x, y } => {
                if !self.in_bounds(*x, *y) {
                    return Ok(false);
                }
                let ok = {
                    let _hidden = OverlaySuspension::acquire(self.overlay.as_ref()).await;
                    let first = self.device.tap(*x, *y).await;
                    cancellable_sleep(self.timing.double_tap_interval, cancel).await?;
                    let second = self.device.tap(*x, *y).await;
                    first && second
                };
                self.settle(self.timing.settle, cancel).await?;
                Ok(ok)
            }
            Action::LongPress { x, y } => {
                if !self.in_bounds(*x, *y) {
                    return Ok(false);
                }
                let ok = {
                    let _hidden = OverlaySuspension::acquire(self.overlay.as_ref()).await;
                    self.device.long_press(*x, *y, self.timing.long_press).await
                };
                self.settle(self.timing.settle, cancel).await?;
                Ok(ok)
            }
            Action::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
            } => {
                let ok = {
                    let _hidden = OverlaySuspension::acquire(self.overlay.as_ref()).await;
                    self.device
                        .swipe(*start_x, *start_y, *end_x, *end_y, self.timing.swipe)
                        .await
                };
                self.settle(self.timing.settle, cancel).await?;
                Ok(ok)
            }
            Action::TypeText { text } => {
                let ok = self.device.type_text(text).await;
                self.settle(self.timing.settle, cancel).await?;
                Ok(ok)
            }
            Action::Launch { app } => {
                if !self.device.resolve_and_launch(app).await {
                    tracing::warn!(app = %app, "App not resolvable");
                    return Ok(false);
                }
                self.settle(self.timing.launch_settle, cancel).await?;
                Ok(true)
            }
            Action::Back => {
                let ok = self.device.global_back();
                self.settle(self.timing.settle, cancel).await?;
                Ok(ok)
            }
            Action::Home => {
                let ok = self.device.global_home();
                self.settle(self.timing.settle, cancel).await?;
                Ok(ok)
            }
            Action::Wait { duration_ms } => {
                cancellable_sleep(Duration::from_millis(*duration_ms), cancel).await?;
                Ok(true)
            }
            Action::Finish { .. } => Ok(true),
            Action::Error { reason } => {
                tracing::warn!(reason = %reason, "Refusing to execute unparsable action");
                Ok(false)
            }
            Action::Unknown => Ok(false),
        }
    }

    async fn settle(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), AgentError> {
        cancellable_sleep(duration, cancel).await
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        let ok = (0..=self.device.screen_width()).contains(&x)
            && (0..=self.device.screen_height()).contains(&y);
        if !ok {
            tracing::warn!(x, y, "Coordinates outside screen bounds");
        }
        ok
    }

    fn audit(&self, action: &Action, ok: bool, outcome: &str, elapsed: Duration) {
        let audit = serde_json::json!({
            "event": "action_audit",
            "action": action.name(),
            "description": describe_action(action),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": elapsed.as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "action");
    }
}

fn touches_device(action: &Action) -> bool {
    !matches!(
        action,
        Action::Wait { .. } | Action::Finish { .. } | Action::Error { .. } | Action::Unknown
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, NoOverlay, RecordingOverlay, SimulatedDevice};

    fn executor(device: Arc<SimulatedDevice>) -> ActionExecutor {
        ActionExecutor::new(device, Arc::new(NoOverlay), ExecutorTiming::immediate())
    }

    #[tokio::test]
    async fn test_tap_delegates_once() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        let exec = executor(device.clone());
        let ok = exec
            .execute(&Action::Tap { x: 540, y: 1800 }, &CancellationToken::new())
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(device.calls(), vec![DeviceCall::Tap { x: 540, y: 1800 }]);
    }

    #[tokio::test]
    async fn test_out_of_bounds_tap_fails_without_device_call() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        let exec = executor(device.clone());
        let token = CancellationToken::new();
        assert!(!exec.execute(&Action::Tap { x: -1, y: 10 }, &token).await.unwrap());
        assert!(!exec.execute(&Action::LongPress { x: 10, y: 2401 }, &token).await.unwrap());
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_double_tap_taps_twice() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        let exec = executor(device.clone());
        let ok = exec
            .execute(&Action::DoubleTap { x: 1, y: 2 }, &CancellationToken::new())
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(
            device.calls(),
            vec![DeviceCall::Tap { x: 1, y: 2 }, DeviceCall::Tap { x: 1, y: 2 }]
        );
    }

    #[tokio::test]
    async fn test_failed_gesture_reports_false() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        device.set_fail_gestures(true);
        let exec = executor(device.clone());
        let token = CancellationToken::new();
        assert!(!exec.execute(&Action::Tap { x: 1, y: 2 }, &token).await.unwrap());
        assert!(!exec.execute(&Action::DoubleTap { x: 1, y: 2 }, &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_launch_unresolvable_has_no_side_effect() {
        let device = Arc::new(
            SimulatedDevice::new(1080, 2400).with_apps(vec!["Settings".to_string()]),
        );
        let exec = executor(device.clone());
        let token = CancellationToken::new();
        let missing = Action::Launch { app: "Nope".to_string() };
        assert!(!exec.execute(&missing, &token).await.unwrap());
        assert!(device.calls().is_empty());

        let found = Action::Launch { app: "settings".to_string() };
        assert!(exec.execute(&found, &token).await.unwrap());
        assert_eq!(device.current_app().as_deref(), Some("Settings"));
    }

    #[tokio::test]
    async fn test_non_device_actions() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        let exec = executor(device.clone());
        let token = CancellationToken::new();
        assert!(exec.execute(&Action::Wait { duration_ms: 1 }, &token).await.unwrap());
        assert!(exec
            .execute(&Action::Finish { message: "done".into() }, &token)
            .await
            .unwrap());
        assert!(!exec.execute(&Action::error("bad"), &token).await.unwrap());
        assert!(!exec.execute(&Action::Unknown, &token).await.unwrap());
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_device() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        device.set_available(false);
        let exec = executor(device.clone());
        let token = CancellationToken::new();
        assert_eq!(
            exec.execute(&Action::Back, &token).await,
            Err(AgentError::ExecutorUnavailable)
        );
        // 不触碰设备的动作不受影响
        assert_eq!(
            exec.execute(&Action::Finish { message: String::new() }, &token).await,
            Ok(true)
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_settle() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        let timing = ExecutorTiming {
            settle: Duration::from_secs(30),
            ..ExecutorTiming::immediate()
        };
        let exec = ActionExecutor::new(device.clone(), Arc::new(NoOverlay), timing);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let res = exec.execute(&Action::Home, &token).await;
        assert_eq!(res, Err(AgentError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(device.calls(), vec![DeviceCall::Home]);
    }

    #[tokio::test]
    async fn test_cancelled_before_execute() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        let exec = executor(device.clone());
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            exec.execute(&Action::Tap { x: 1, y: 1 }, &token).await,
            Err(AgentError::Cancelled)
        );
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gestures_suspend_overlay() {
        let device = Arc::new(SimulatedDevice::new(1080, 2400));
        let overlay = Arc::new(RecordingOverlay::new());
        let exec = ActionExecutor::new(device, overlay.clone(), ExecutorTiming::immediate());
        let token = CancellationToken::new();
        exec.execute(&Action::Tap { x: 1, y: 1 }, &token).await.unwrap();
        exec.execute(
            &Action::Swipe { start_x: 1, start_y: 1, end_x: 2, end_y: 2 },
            &token,
        )
        .await
        .unwrap();
        exec.execute(&Action::Back, &token).await.unwrap();
        assert_eq!(overlay.suspend_count(), 2);
        assert_eq!(overlay.restore_count(), 2);
        assert!(!overlay.is_hidden());
    }
}
