//! Event Publisher Implementation
//!
//! 向展示层推送客户端事件（状态更新、摘要展开、通知）

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::ports::PollPhase;

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// 客户端事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// 拉取到新的书籍状态
    StatusUpdated {
        book_id: String,
        completed_chapters: usize,
        total_chapters: usize,
        should_stop_polling: bool,
    },
    /// 状态拉取失败
    StatusFailed { book_id: String, error: String },
    /// 轮询阶段变化
    PollPhaseChanged { book_id: String, phase: PollPhase },
    /// 摘要节点展开完成
    SectionExpanded {
        book_id: String,
        section_id: String,
        from_cache: bool,
    },
    /// 摘要节点加载失败
    SectionFailed {
        book_id: String,
        section_id: String,
        error: String,
    },
    /// 上传完成
    BookUploaded { book_id: String, title: String },
    /// 删除完成
    BookDeleted { book_id: String },
    /// 用户操作的提示消息
    Notification {
        level: NotificationLevel,
        message: String,
    },
}

impl ClientEvent {
    /// 事件所属的书籍（通知类事件为 None）
    pub fn book_id(&self) -> Option<&str> {
        match self {
            ClientEvent::StatusUpdated { book_id, .. }
            | ClientEvent::StatusFailed { book_id, .. }
            | ClientEvent::PollPhaseChanged { book_id, .. }
            | ClientEvent::SectionExpanded { book_id, .. }
            | ClientEvent::SectionFailed { book_id, .. }
            | ClientEvent::BookUploaded { book_id, .. }
            | ClientEvent::BookDeleted { book_id } => Some(book_id),
            ClientEvent::Notification { .. } => None,
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    /// book_id -> broadcast sender (for book-specific events)
    book_channels: DashMap<String, broadcast::Sender<ClientEvent>>,
    /// Global broadcast channel, receives every event
    global_channel: broadcast::Sender<ClientEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(256);
        Self {
            book_channels: DashMap::new(),
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<ClientEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅某本书的事件
    pub fn subscribe_book(&self, book_id: &str) -> broadcast::Receiver<ClientEvent> {
        self.book_channels
            .entry(book_id.to_string())
            .or_insert_with(|| broadcast::channel(100).0)
            .subscribe()
    }

    /// 取消某本书的事件通道
    pub fn unregister_book(&self, book_id: &str) {
        self.book_channels.remove(book_id);
    }

    pub fn publish_status_updated(
        &self,
        book_id: &str,
        completed_chapters: usize,
        total_chapters: usize,
        should_stop_polling: bool,
    ) {
        self.publish(ClientEvent::StatusUpdated {
            book_id: book_id.to_string(),
            completed_chapters,
            total_chapters,
            should_stop_polling,
        });
    }

    pub fn publish_status_failed(&self, book_id: &str, error: &str) {
        self.publish(ClientEvent::StatusFailed {
            book_id: book_id.to_string(),
            error: error.to_string(),
        });
    }

    pub fn publish_poll_phase(&self, book_id: &str, phase: PollPhase) {
        self.publish(ClientEvent::PollPhaseChanged {
            book_id: book_id.to_string(),
            phase,
        });
    }

    pub fn publish_section_expanded(&self, book_id: &str, section_id: &str, from_cache: bool) {
        self.publish(ClientEvent::SectionExpanded {
            book_id: book_id.to_string(),
            section_id: section_id.to_string(),
            from_cache,
        });
    }

    pub fn publish_section_failed(&self, book_id: &str, section_id: &str, error: &str) {
        self.publish(ClientEvent::SectionFailed {
            book_id: book_id.to_string(),
            section_id: section_id.to_string(),
            error: error.to_string(),
        });
    }

    pub fn publish_book_uploaded(&self, book_id: &str, title: &str) {
        self.publish(ClientEvent::BookUploaded {
            book_id: book_id.to_string(),
            title: title.to_string(),
        });
    }

    pub fn publish_book_deleted(&self, book_id: &str) {
        self.publish(ClientEvent::BookDeleted {
            book_id: book_id.to_string(),
        });
    }

    /// 成功提示
    pub fn notify_success(&self, message: impl Into<String>) {
        self.publish(ClientEvent::Notification {
            level: NotificationLevel::Success,
            message: message.into(),
        });
    }

    /// 失败提示
    pub fn notify_error(&self, message: impl Into<String>) {
        self.publish(ClientEvent::Notification {
            level: NotificationLevel::Error,
            message: message.into(),
        });
    }

    /// 发布事件：书籍相关事件同时投递到书籍通道
    fn publish(&self, event: ClientEvent) {
        if let Some(book_id) = event.book_id() {
            if let Some(sender) = self.book_channels.get(book_id) {
                if let Err(e) = sender.send(event.clone()) {
                    tracing::debug!(
                        book_id = %book_id,
                        error = %e,
                        "Failed to publish book event (no receivers)"
                    );
                }
            }
        }

        if let Err(e) = self.global_channel.send(event) {
            tracing::trace!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
