//! Chapter Command Handlers
//!
//! 重试与重新生成都会让书籍状态失效并恢复轮询

use std::sync::Arc;

use crate::application::commands::{ResummarizeChapter, RetryChapter};
use crate::application::error::ApplicationError;
use crate::application::ports::{BookApiPort, PollingControlPort, StatusStorePort, SummaryCachePort};
use crate::infrastructure::events::EventPublisher;

// ============================================================================
// RetryChapter
// ============================================================================

/// 重试响应
#[derive(Debug, Clone)]
pub struct RetryChapterResponse {
    /// 后端返回的状态（如 "queued"）
    pub status: String,
    /// 是否有活跃的轮询器被恢复
    pub polling_resumed: bool,
}

/// RetryChapter Handler
pub struct RetryChapterHandler {
    api: Arc<dyn BookApiPort>,
    status_store: Arc<dyn StatusStorePort>,
    polling: Arc<dyn PollingControlPort>,
    event_publisher: Arc<EventPublisher>,
}

impl RetryChapterHandler {
    pub fn new(
        api: Arc<dyn BookApiPort>,
        status_store: Arc<dyn StatusStorePort>,
        polling: Arc<dyn PollingControlPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            api,
            status_store,
            polling,
            event_publisher,
        }
    }

    pub async fn handle(&self, command: RetryChapter) -> Result<RetryChapterResponse, ApplicationError> {
        let response = match self.api.retry_chapter(&command.book_id, &command.chapter_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    book_id = %command.book_id,
                    chapter_id = %command.chapter_id,
                    error = %e,
                    "Retry failed"
                );
                self.event_publisher.notify_error(e.to_string());
                return Err(e.into());
            }
        };

        self.status_store.invalidate(&command.book_id);
        let polling_resumed = self.polling.resume(&command.book_id);

        tracing::info!(
            book_id = %command.book_id,
            chapter_id = %command.chapter_id,
            status = %response.status,
            polling_resumed = polling_resumed,
            "Chapter retry queued"
        );
        self.event_publisher.notify_success("Chapter queued for retry");

        Ok(RetryChapterResponse {
            status: response.status,
            polling_resumed,
        })
    }
}

// ============================================================================
// ResummarizeChapter
// ============================================================================

/// 重新生成响应
#[derive(Debug, Clone)]
pub struct ResummarizeChapterResponse {
    pub message: String,
    /// 后端删除的摘要文件
    pub deleted_files: Vec<String>,
    /// 本地删除的缓存条目数
    pub cache_entries_removed: usize,
    pub polling_resumed: bool,
}

/// ResummarizeChapter Handler
pub struct ResummarizeChapterHandler {
    api: Arc<dyn BookApiPort>,
    cache: Arc<dyn SummaryCachePort>,
    status_store: Arc<dyn StatusStorePort>,
    polling: Arc<dyn PollingControlPort>,
    event_publisher: Arc<EventPublisher>,
}

impl ResummarizeChapterHandler {
    pub fn new(
        api: Arc<dyn BookApiPort>,
        cache: Arc<dyn SummaryCachePort>,
        status_store: Arc<dyn StatusStorePort>,
        polling: Arc<dyn PollingControlPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            api,
            cache,
            status_store,
            polling,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        command: ResummarizeChapter,
    ) -> Result<ResummarizeChapterResponse, ApplicationError> {
        let response = match self
            .api
            .delete_chapter_summaries(&command.book_id, &command.chapter_id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    book_id = %command.book_id,
                    chapter_id = %command.chapter_id,
                    error = %e,
                    "Re-summarize failed"
                );
                self.event_publisher.notify_error(e.to_string());
                return Err(e.into());
            }
        };

        let cache_entries_removed = self
            .cache
            .remove_section(&command.book_id, Some(&command.chapter_id));
        self.status_store.invalidate(&command.book_id);
        let polling_resumed = self.polling.resume(&command.book_id);

        let message = response
            .message
            .unwrap_or_else(|| "Chapter summaries deleted".to_string());

        tracing::info!(
            book_id = %command.book_id,
            chapter_id = %command.chapter_id,
            deleted_files = response.deleted_files.len(),
            cache_entries_removed = cache_entries_removed,
            polling_resumed = polling_resumed,
            "Chapter queued for re-summarization"
        );
        self.event_publisher.notify_success(message.clone());

        Ok(ResummarizeChapterResponse {
            message,
            deleted_files: response.deleted_files,
            cache_entries_removed,
            polling_resumed,
        })
    }
}
