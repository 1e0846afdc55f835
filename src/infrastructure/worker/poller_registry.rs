//! Status Poller Registry
//!
//! 管理所有正在观察的书籍的轮询任务，同一本书只会有一个轮询器

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::status_poller::{StatusPoller, StatusPollerConfig, StatusPollerHandle};
use crate::application::ports::{BookApiPort, PollPhase, PollingControlPort, StatusStorePort};
use crate::infrastructure::events::EventPublisher;

pub struct StatusPollerRegistry {
    config: StatusPollerConfig,
    api: Arc<dyn BookApiPort>,
    store: Arc<dyn StatusStorePort>,
    events: Arc<EventPublisher>,
    pollers: DashMap<String, StatusPollerHandle>,
    visible: AtomicBool,
}

impl StatusPollerRegistry {
    pub fn new(
        config: StatusPollerConfig,
        api: Arc<dyn BookApiPort>,
        store: Arc<dyn StatusStorePort>,
        events: Arc<EventPublisher>,
    ) -> Self {
        Self {
            config,
            api,
            store,
            events,
            pollers: DashMap::new(),
            visible: AtomicBool::new(true),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 开始观察一本书；已有活跃轮询器时直接返回其句柄
    ///
    /// 必须在 tokio runtime 内调用
    pub fn watch(&self, book_id: &str) -> StatusPollerHandle {
        let mut handle = self
            .pollers
            .entry(book_id.to_string())
            .or_insert_with(|| self.spawn(book_id));
        if handle.is_stopped() {
            *handle = self.spawn(book_id);
        }
        handle.clone()
    }

    fn spawn(&self, book_id: &str) -> StatusPollerHandle {
        let (poller, handle) = StatusPoller::new(
            self.config.clone(),
            book_id,
            self.api.clone(),
            self.store.clone(),
            self.events.clone(),
        );
        handle.set_visible(self.visible.load(Ordering::SeqCst));
        tokio::spawn(poller.run());
        tracing::debug!(book_id = %book_id, "Status poller spawned");
        handle
    }

    pub fn handle(&self, book_id: &str) -> Option<StatusPollerHandle> {
        self.pollers.get(book_id).map(|h| h.clone())
    }

    /// 停止观察一本书
    pub fn stop(&self, book_id: &str) -> bool {
        match self.pollers.remove(book_id) {
            Some((_, handle)) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        for entry in self.pollers.iter() {
            entry.value().stop();
        }
        self.pollers.clear();
    }

    /// 展示层可见性变化，同步到所有轮询器
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
        for entry in self.pollers.iter() {
            entry.value().set_visible(visible);
        }
    }

    pub fn active_count(&self) -> usize {
        self.pollers.iter().filter(|h| !h.is_stopped()).count()
    }
}

impl PollingControlPort for StatusPollerRegistry {
    fn resume(&self, book_id: &str) -> bool {
        match self.pollers.get(book_id) {
            Some(handle) => handle.resume(),
            None => false,
        }
    }

    fn phase(&self, book_id: &str) -> PollPhase {
        self.pollers
            .get(book_id)
            .map(|h| h.phase())
            .unwrap_or(PollPhase::Idle)
    }
}
