//! Status Poller - Background Book Status Polling
//!
//! 每本书一个轮询任务：
//! - Polling: 按固定间隔拉取状态
//! - Settled: 所有章节进入终态后停止计时器，等待 resume
//! - 不可见时不发请求，恢复可见后立即拉取一次
//! - 拉取失败只记录错误，不改变节奏

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BookApiPort, PollPhase, StatusStorePort};
use crate::infrastructure::events::EventPublisher;

/// 轮询配置
#[derive(Debug, Clone)]
pub struct StatusPollerConfig {
    /// 轮询间隔
    pub interval: Duration,
}

impl Default for StatusPollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
        }
    }
}

/// 轮询任务的控制句柄
///
/// 所有句柄都被 drop 后轮询任务自行退出
#[derive(Clone)]
pub struct StatusPollerHandle {
    book_id: String,
    resume_tx: mpsc::Sender<()>,
    visibility_tx: Arc<watch::Sender<bool>>,
    phase_rx: watch::Receiver<PollPhase>,
    cancel: CancellationToken,
}

impl StatusPollerHandle {
    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    /// 使状态失效并恢复轮询，返回任务是否仍在运行
    pub fn resume(&self) -> bool {
        match self.resume_tx.try_send(()) {
            Ok(()) => true,
            // 已有一个待处理的 resume
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// 设置展示层可见性
    pub fn set_visible(&self, visible: bool) {
        self.visibility_tx.send_replace(visible);
    }

    pub fn is_visible(&self) -> bool {
        *self.visibility_tx.borrow()
    }

    pub fn phase(&self) -> PollPhase {
        *self.phase_rx.borrow()
    }

    /// 等待进入指定阶段；任务已退出时返回 false
    pub async fn wait_for_phase(&self, phase: PollPhase) -> bool {
        let mut rx = self.phase_rx.clone();
        let reached = rx.wait_for(|p| *p == phase).await.is_ok();
        reached
    }

    /// 停止轮询任务
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.resume_tx.is_closed()
    }
}

/// 状态轮询任务
pub struct StatusPoller {
    config: StatusPollerConfig,
    book_id: String,
    api: Arc<dyn BookApiPort>,
    store: Arc<dyn StatusStorePort>,
    events: Arc<EventPublisher>,
    resume_rx: mpsc::Receiver<()>,
    visibility_rx: watch::Receiver<bool>,
    phase_tx: watch::Sender<PollPhase>,
    cancel: CancellationToken,
}

impl StatusPoller {
    pub fn new(
        config: StatusPollerConfig,
        book_id: impl Into<String>,
        api: Arc<dyn BookApiPort>,
        store: Arc<dyn StatusStorePort>,
        events: Arc<EventPublisher>,
    ) -> (Self, StatusPollerHandle) {
        let book_id = book_id.into();
        let (resume_tx, resume_rx) = mpsc::channel(1);
        let (visibility_tx, visibility_rx) = watch::channel(true);
        let (phase_tx, phase_rx) = watch::channel(PollPhase::Idle);
        let cancel = CancellationToken::new();

        let handle = StatusPollerHandle {
            book_id: book_id.clone(),
            resume_tx,
            visibility_tx: Arc::new(visibility_tx),
            phase_rx,
            cancel: cancel.clone(),
        };

        let poller = Self {
            config,
            book_id,
            api,
            store,
            events,
            resume_rx,
            visibility_rx,
            phase_tx,
            cancel,
        };

        (poller, handle)
    }

    /// 启动轮询循环
    pub async fn run(mut self) {
        tracing::info!(
            book_id = %self.book_id,
            interval_ms = self.config.interval.as_millis() as u64,
            "StatusPoller started"
        );
        self.set_phase(PollPhase::Polling);

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let polling = *self.phase_tx.borrow() == PollPhase::Polling;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                resumed = self.resume_rx.recv() => {
                    if resumed.is_none() {
                        tracing::debug!(book_id = %self.book_id, "All poller handles dropped");
                        break;
                    }
                    self.store.invalidate(&self.book_id);
                    self.set_phase(PollPhase::Polling);
                    ticker.reset_immediately();
                }

                changed = self.visibility_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let visible = *self.visibility_rx.borrow_and_update();
                    tracing::debug!(book_id = %self.book_id, visible = visible, "Visibility changed");
                    if visible && polling {
                        ticker.reset_immediately();
                    }
                }

                _ = ticker.tick(), if polling => {
                    if !*self.visibility_rx.borrow() {
                        tracing::trace!(book_id = %self.book_id, "Hidden, skipping status poll");
                        continue;
                    }
                    if self.poll_once().await {
                        self.set_phase(PollPhase::Settled);
                    }
                }
            }
        }

        self.set_phase(PollPhase::Idle);
        tracing::info!(book_id = %self.book_id, "StatusPoller stopped");
    }

    /// 拉取一次状态，返回是否可以停止轮询
    async fn poll_once(&self) -> bool {
        match self.api.get_status(&self.book_id).await {
            Ok(status) => {
                let stop = status.should_stop_polling();
                self.events.publish_status_updated(
                    &self.book_id,
                    status.completed_chapters,
                    status.total_chapters,
                    stop,
                );
                self.store.put_status(&self.book_id, status);

                if stop || self.store.non_chapters(&self.book_id).is_none() {
                    self.refresh_non_chapters().await;
                }
                stop
            }
            Err(e) => {
                tracing::warn!(book_id = %self.book_id, error = %e, "Status poll failed");
                self.store.record_error(&self.book_id, e.to_string());
                self.events.publish_status_failed(&self.book_id, &e.to_string());
                false
            }
        }
    }

    async fn refresh_non_chapters(&self) {
        match self.api.get_non_chapters(&self.book_id).await {
            Ok(ids) => self.store.put_non_chapters(&self.book_id, ids),
            Err(e) => {
                tracing::warn!(book_id = %self.book_id, error = %e, "Failed to fetch non-chapters");
            }
        }
    }

    fn set_phase(&self, phase: PollPhase) {
        let changed = self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                *current = phase;
                true
            }
        });
        if changed {
            tracing::debug!(book_id = %self.book_id, phase = phase.as_str(), "Poll phase changed");
            self.events.publish_poll_phase(&self.book_id, phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ApiError, ApiOperation};
    use crate::domain::book::{BookStatus, ChapterState, ChapterStatus};
    use crate::infrastructure::adapters::FakeBookApi;
    use crate::infrastructure::events::ClientEvent;
    use crate::infrastructure::memory::InMemoryStatusStore;

    fn status(states: &[ChapterState]) -> BookStatus {
        BookStatus::from_chapters(
            states
                .iter()
                .enumerate()
                .map(|(i, s)| ChapterStatus::new(format!("ch-{}", i + 1), format!("Chapter {}", i + 1), *s))
                .collect(),
        )
    }

    struct Fixture {
        api: Arc<FakeBookApi>,
        store: Arc<InMemoryStatusStore>,
        events: Arc<EventPublisher>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                api: Arc::new(FakeBookApi::new()),
                store: Arc::new(InMemoryStatusStore::new()),
                events: Arc::new(EventPublisher::new()),
            }
        }

        fn poller(&self, book_id: &str) -> (StatusPoller, StatusPollerHandle) {
            StatusPoller::new(
                StatusPollerConfig::default(),
                book_id,
                self.api.clone(),
                self.store.clone(),
                self.events.clone(),
            )
        }
    }

    const STATUS_CALL: &str = "GET /api/books/b1/status";

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_settled() {
        let fx = Fixture::new();
        fx.api.push_status("b1", status(&[ChapterState::Pending, ChapterState::Processing]));
        fx.api.push_status("b1", status(&[ChapterState::Complete, ChapterState::Processing]));
        fx.api.push_status("b1", status(&[ChapterState::Complete, ChapterState::Complete]));

        let (poller, handle) = fx.poller("b1");
        tokio::spawn(poller.run());

        assert!(handle.wait_for_phase(PollPhase::Settled).await);
        assert_eq!(fx.api.call_count(STATUS_CALL), 3);
        assert!(fx.store.fresh_status("b1").unwrap().should_stop_polling());

        // 计时器已停止
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fx.api.call_count(STATUS_CALL), 3);
        assert_eq!(handle.phase(), PollPhase::Settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_between_polls() {
        let fx = Fixture::new();
        fx.api.push_status("b1", status(&[ChapterState::Processing]));

        let (poller, _handle) = fx.poller("b1");
        tokio::spawn(poller.run());

        // 第一次立即拉取
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fx.api.call_count(STATUS_CALL), 1);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(fx.api.call_count(STATUS_CALL), 2);

        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(fx.api.call_count(STATUS_CALL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_requests_while_hidden() {
        let fx = Fixture::new();
        fx.api.push_status("b1", status(&[ChapterState::Complete]));

        let (poller, handle) = fx.poller("b1");
        handle.set_visible(false);
        tokio::spawn(poller.run());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fx.api.call_count(STATUS_CALL), 0);
        assert_eq!(handle.phase(), PollPhase::Polling);

        handle.set_visible(true);
        assert!(handle.wait_for_phase(PollPhase::Settled).await);
        assert_eq!(fx.api.call_count(STATUS_CALL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_cadence() {
        let fx = Fixture::new();
        fx.api.push_status("b1", status(&[ChapterState::Complete]));
        fx.api.fail_next(
            ApiOperation::GetStatus,
            ApiError::status_error(ApiOperation::GetStatus, 503, "Service Unavailable"),
        );
        let mut events = fx.events.subscribe_book("b1");

        let (poller, handle) = fx.poller("b1");
        tokio::spawn(poller.run());

        assert!(handle.wait_for_phase(PollPhase::Settled).await);
        assert_eq!(fx.api.call_count(STATUS_CALL), 2);
        assert!(fx.store.get("b1").unwrap().error.is_none());

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let ClientEvent::StatusFailed { error, .. } = event {
                assert!(error.contains("Service Unavailable"));
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_settled() {
        let fx = Fixture::new();
        fx.api.push_status("b1", status(&[ChapterState::Complete, ChapterState::Complete]));

        let (poller, handle) = fx.poller("b1");
        tokio::spawn(poller.run());
        assert!(handle.wait_for_phase(PollPhase::Settled).await);

        // 重新生成摘要后后端把章节重置为 pending
        fx.api.delete_chapter_summaries("b1", "ch-2").await.unwrap();
        let mut events = fx.events.subscribe_book("b1");
        assert!(handle.resume());

        let mut seen = Vec::new();
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                match events.recv().await {
                    Ok(event @ ClientEvent::StatusUpdated { .. }) => {
                        seen.push(event);
                        break;
                    }
                    Ok(event) => seen.push(event),
                    Err(_) => break,
                }
            }
        })
        .await
        .unwrap();

        assert!(matches!(
            seen.first(),
            Some(ClientEvent::PollPhaseChanged { phase: PollPhase::Polling, .. })
        ));
        // 拿到 pending，继续轮询
        assert!(matches!(
            seen.last(),
            Some(ClientEvent::StatusUpdated { should_stop_polling: false, .. })
        ));
        assert_eq!(fx.api.call_count(STATUS_CALL), 2);
        assert_eq!(handle.phase(), PollPhase::Polling);

        let snapshot = fx.store.get("b1").unwrap();
        assert!(!snapshot.stale);
        assert_eq!(
            snapshot.status.unwrap().chapter("ch-2").unwrap().status,
            ChapterState::Pending
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_drop_end_task() {
        let fx = Fixture::new();
        fx.api.push_status("b1", status(&[ChapterState::Processing]));

        let (poller, handle) = fx.poller("b1");
        let task = tokio::spawn(poller.run());
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.stop();
        task.await.unwrap();
        assert_eq!(handle.phase(), PollPhase::Idle);
        assert!(handle.is_stopped());
        assert!(!handle.resume());

        let (poller, handle) = fx.poller("b1");
        let task = tokio::spawn(poller.run());
        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_chapters_loaded_on_settle() {
        let fx = Fixture::new();
        fx.api.push_status("b1", status(&[ChapterState::Complete]));
        fx.api.set_non_chapters("b1", vec!["ch-0".to_string()]);

        let (poller, handle) = fx.poller("b1");
        tokio::spawn(poller.run());
        assert!(handle.wait_for_phase(PollPhase::Settled).await);

        assert_eq!(fx.store.non_chapters("b1"), Some(vec!["ch-0".to_string()]));
    }
}
