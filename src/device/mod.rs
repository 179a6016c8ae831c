//! 设备层：核心循环依赖的外部协作者抽象（手势、截屏、图片存储、悬浮窗）与本地实现
//!
//! 核心只通过这些 trait 访问设备；真实的无障碍手势注入、截屏等由平台侧实现并注入。

pub mod image_store;
pub mod overlay;
pub mod screenshot;
pub mod simulated;
pub mod traits;

pub use image_store::{FileImageStore, NoopImageStore};
pub use overlay::{NoOverlay, OverlaySuspension, RecordingOverlay};
pub use screenshot::{ImageFormat, Screenshot};
pub use simulated::{DeviceCall, SimulatedCapture, SimulatedDevice};
pub use traits::{Device, ImageStore, Overlay, ScreenCapture};
