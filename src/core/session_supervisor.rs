//! 会话监管：生命周期、中断管理
//!
//! 持有根 CancellationToken 与当前任务的子 token。开始新任务时先取消旧任务的 token，
//! 保证同一时刻最多只有一个任务循环在运行；shutdown 取消根 token，所有任务随之停止。

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// 会话级生命周期管理
#[derive(Debug)]
pub struct SessionSupervisor {
    root: CancellationToken,
    current: Mutex<Option<CancellationToken>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            current: Mutex::new(None),
        }
    }

    /// 取消当前任务并为新任务签发子 token
    pub fn begin_task(&self) -> CancellationToken {
        let token = self.root.child_token();
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
        }
        token
    }

    /// 取消当前任务（用户停止）
    pub fn cancel(&self) {
        if let Ok(current) = self.current.lock() {
            if let Some(token) = current.as_ref() {
                token.cancel();
            }
        }
    }

    /// 退出：取消根 token，所有任务一并取消
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
