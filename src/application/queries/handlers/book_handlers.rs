//! Book Query Handlers
//!
//! 查询失败返回错误，状态类查询同时把错误记录在状态快照上

use serde::Serialize;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{ApiError, BookApiPort, StatusStorePort};
use crate::application::queries::{GetBook, GetBookStatus, GetNonChapters, ListBooks};
use crate::domain::book::{Book, BookStatus};

// ============================================================================
// Response DTOs
// ============================================================================

/// 书籍状态响应
#[derive(Debug, Clone, Serialize)]
pub struct BookStatusResponse {
    pub book_id: String,
    pub status: BookStatus,
    /// 排除 non-chapter 后的完成数
    pub completed: usize,
    /// 排除 non-chapter 后的总数
    pub total: usize,
    pub should_stop_polling: bool,
    /// 是否来自本地快照
    pub from_store: bool,
}

impl BookStatusResponse {
    fn new(book_id: &str, status: BookStatus, non_chapters: &[String], from_store: bool) -> Self {
        let (completed, total) = status.progress(non_chapters);
        Self {
            book_id: book_id.to_string(),
            should_stop_polling: status.should_stop_polling(),
            status,
            completed,
            total,
            from_store,
        }
    }
}

fn book_not_found(error: ApiError, book_id: &str) -> ApplicationError {
    if error.status() == Some(404) {
        ApplicationError::not_found("Book", book_id)
    } else {
        error.into()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// ListBooks Handler
pub struct ListBooksHandler {
    api: Arc<dyn BookApiPort>,
}

impl ListBooksHandler {
    pub fn new(api: Arc<dyn BookApiPort>) -> Self {
        Self { api }
    }

    pub async fn handle(&self, _query: ListBooks) -> Result<Vec<Book>, ApplicationError> {
        Ok(self.api.list_books().await?)
    }
}

/// GetBook Handler
pub struct GetBookHandler {
    api: Arc<dyn BookApiPort>,
}

impl GetBookHandler {
    pub fn new(api: Arc<dyn BookApiPort>) -> Self {
        Self { api }
    }

    pub async fn handle(&self, query: GetBook) -> Result<Book, ApplicationError> {
        self.api
            .get_book(&query.book_id)
            .await
            .map_err(|e| book_not_found(e, &query.book_id))
    }
}

/// GetBookStatus Handler - 本地快照新鲜时不请求后端
pub struct GetBookStatusHandler {
    api: Arc<dyn BookApiPort>,
    status_store: Arc<dyn StatusStorePort>,
}

impl GetBookStatusHandler {
    pub fn new(api: Arc<dyn BookApiPort>, status_store: Arc<dyn StatusStorePort>) -> Self {
        Self { api, status_store }
    }

    pub async fn handle(&self, query: GetBookStatus) -> Result<BookStatusResponse, ApplicationError> {
        let book_id = query.book_id.as_str();
        let non_chapters = self.status_store.non_chapters(book_id).unwrap_or_default();

        if !query.force_refresh {
            if let Some(status) = self.status_store.fresh_status(book_id) {
                return Ok(BookStatusResponse::new(book_id, status, &non_chapters, true));
            }
        }

        match self.api.get_status(book_id).await {
            Ok(status) => {
                self.status_store.put_status(book_id, status.clone());
                Ok(BookStatusResponse::new(book_id, status, &non_chapters, false))
            }
            Err(e) => {
                tracing::warn!(book_id = %book_id, error = %e, "Failed to get status");
                self.status_store.record_error(book_id, e.to_string());
                Err(book_not_found(e, book_id))
            }
        }
    }
}

/// GetNonChapters Handler - 结果保存在状态快照上
pub struct GetNonChaptersHandler {
    api: Arc<dyn BookApiPort>,
    status_store: Arc<dyn StatusStorePort>,
}

impl GetNonChaptersHandler {
    pub fn new(api: Arc<dyn BookApiPort>, status_store: Arc<dyn StatusStorePort>) -> Self {
        Self { api, status_store }
    }

    pub async fn handle(&self, query: GetNonChapters) -> Result<Vec<String>, ApplicationError> {
        if let Some(ids) = self.status_store.non_chapters(&query.book_id) {
            return Ok(ids);
        }

        let ids = self
            .api
            .get_non_chapters(&query.book_id)
            .await
            .map_err(|e| book_not_found(e, &query.book_id))?;
        self.status_store.put_non_chapters(&query.book_id, ids.clone());
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ApiOperation;
    use crate::domain::book::{ChapterState, ChapterStatus};
    use crate::infrastructure::adapters::FakeBookApi;
    use crate::infrastructure::memory::InMemoryStatusStore;

    fn status() -> BookStatus {
        BookStatus::from_chapters(vec![
            ChapterStatus::new("front", "Front Matter", ChapterState::Complete),
            ChapterStatus::new("ch-1", "Loomings", ChapterState::Complete),
            ChapterStatus::new("ch-2", "The Carpet-Bag", ChapterState::Processing),
        ])
    }

    #[tokio::test]
    async fn test_status_served_from_store_until_invalidated() {
        let api = Arc::new(FakeBookApi::new());
        api.push_status("b1", status());
        let store = Arc::new(InMemoryStatusStore::new());
        let handler = GetBookStatusHandler::new(api.clone(), store.clone());
        let query = || GetBookStatus {
            book_id: "b1".to_string(),
            force_refresh: false,
        };

        assert!(!handler.handle(query()).await.unwrap().from_store);
        assert!(handler.handle(query()).await.unwrap().from_store);
        assert_eq!(api.call_count("GET /api/books/b1/status"), 1);

        store.invalidate("b1");
        assert!(!handler.handle(query()).await.unwrap().from_store);
        assert_eq!(api.call_count("GET /api/books/b1/status"), 2);
    }

    #[tokio::test]
    async fn test_progress_excludes_non_chapters() {
        let api = Arc::new(FakeBookApi::new());
        api.push_status("b1", status());
        api.set_non_chapters("b1", vec!["front".to_string()]);
        let store = Arc::new(InMemoryStatusStore::new());

        let ids = GetNonChaptersHandler::new(api.clone(), store.clone())
            .handle(GetNonChapters {
                book_id: "b1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(ids, vec!["front".to_string()]);

        let response = GetBookStatusHandler::new(api.clone(), store)
            .handle(GetBookStatus {
                book_id: "b1".to_string(),
                force_refresh: true,
            })
            .await
            .unwrap();
        assert_eq!((response.completed, response.total), (1, 2));
        assert_eq!(response.status.total_chapters, 3);
        assert!(!response.should_stop_polling);
    }

    #[tokio::test]
    async fn test_status_error_recorded_and_not_found_mapped() {
        let api = Arc::new(FakeBookApi::new());
        let store = Arc::new(InMemoryStatusStore::new());
        let handler = GetBookStatusHandler::new(api.clone(), store.clone());

        let err = handler
            .handle(GetBookStatus {
                book_id: "missing".to_string(),
                force_refresh: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
        assert!(store.get("missing").unwrap().error.is_some());

        api.fail_next(
            ApiOperation::GetBook,
            ApiError::status_error(ApiOperation::GetBook, 500, "boom"),
        );
        let err = GetBookHandler::new(api)
            .handle(GetBook {
                book_id: "b1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_external());
    }
}
