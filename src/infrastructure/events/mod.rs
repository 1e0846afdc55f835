//! Events Infrastructure - 客户端事件推送

mod publisher;

pub use publisher::{ClientEvent, EventPublisher, NotificationLevel};
