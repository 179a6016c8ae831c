//! UI 状态协作者
//!
//! 编排循环只调用 update_status / set_task_running，且不等待、不消费返回值。
//! ChannelStatusSink 把事件投递到通道，由前台上下文（UI 线程、日志任务）消费。

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::react::{AssistantState, StatusEvent};

/// UI 状态接收方：fire-and-forget
pub trait StatusSink: Send + Sync {
    fn update_status(&self, text: &str, state: AssistantState);

    fn set_task_running(&self, running: bool);
}

/// 丢弃所有状态
#[derive(Debug, Default)]
pub struct NoopStatusSink;

impl StatusSink for NoopStatusSink {
    fn update_status(&self, _text: &str, _state: AssistantState) {}

    fn set_task_running(&self, _running: bool) {}
}

/// 通过无界通道转发状态事件
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelStatusSink {
    pub fn new(tx: mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self { tx }
    }

    /// 新建通道，返回 (sink, 接收端)
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, ev: StatusEvent) {
        // 接收端已关闭时静默丢弃
        let _ = self.tx.send(ev);
    }
}

impl StatusSink for ChannelStatusSink {
    fn update_status(&self, text: &str, state: AssistantState) {
        self.send(StatusEvent::Status {
            text: text.to_string(),
            state,
        });
    }

    fn set_task_running(&self, running: bool) {
        self.send(StatusEvent::TaskRunning { running });
    }
}

/// 记录全部事件（测试用）
#[derive(Debug, Default)]
pub struct RecordingStatusSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// 只取状态文本更新
    pub fn statuses(&self) -> Vec<(String, AssistantState)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::Status { text, state } => Some((text, state)),
                StatusEvent::TaskRunning { .. } => None,
            })
            .collect()
    }

    pub fn last_state(&self) -> Option<AssistantState> {
        self.statuses().last().map(|(_, s)| *s)
    }

    /// 最近一次 set_task_running 的值
    pub fn is_running(&self) -> bool {
        self.events()
            .iter()
            .rev()
            .find_map(|e| match e {
                StatusEvent::TaskRunning { running } => Some(*running),
                StatusEvent::Status { .. } => None,
            })
            .unwrap_or(false)
    }

    fn push(&self, ev: StatusEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(ev);
        }
    }
}

impl StatusSink for RecordingStatusSink {
    fn update_status(&self, text: &str, state: AssistantState) {
        self.push(StatusEvent::Status {
            text: text.to_string(),
            state,
        });
    }

    fn set_task_running(&self, running: bool) {
        self.push(StatusEvent::TaskRunning { running });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelStatusSink::channel();
        sink.set_task_running(true);
        sink.update_status("思考中...", AssistantState::Processing);
        assert_eq!(rx.recv().await, Some(StatusEvent::TaskRunning { running: true }));
        assert_eq!(
            rx.recv().await,
            Some(StatusEvent::Status {
                text: "思考中...".to_string(),
                state: AssistantState::Processing
            })
        );
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelStatusSink::channel();
        drop(rx);
        sink.update_status("x", AssistantState::Idle);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingStatusSink::new();
        sink.set_task_running(true);
        sink.update_status("a", AssistantState::Processing);
        sink.update_status("b", AssistantState::Success);
        sink.set_task_running(false);
        assert_eq!(sink.statuses().len(), 2);
        assert_eq!(sink.last_state(), Some(AssistantState::Success));
        assert!(!sink.is_running());
    }

    #[test]
    fn test_status_event_json() {
        let ev = StatusEvent::Status {
            text: "完成".to_string(),
            state: AssistantState::Success,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["state"], "success");
    }
}
