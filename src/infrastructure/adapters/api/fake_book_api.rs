//! Fake Book API - 用于测试的内存后端
//!
//! 不发出网络请求，按预先设置的数据响应，并记录每一次调用

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{
    cache_key, ApiError, ApiOperation, BookApiPort, ResummarizeResponse, RetryResponse,
};
use crate::domain::book::{Book, BookStatus, UploadFile, UploadResponse};
use crate::domain::summary::{Depth, SummaryResponse};

/// Fake Book API
///
/// - 状态按队列返回，队列只剩一个时保持返回最后一个
/// - 摘要按 `book:section:depth` 查找，未设置时返回 404
/// - `fail_next` 让下一次对应操作返回错误
pub struct FakeBookApi {
    books: DashMap<String, Book>,
    statuses: DashMap<String, VecDeque<BookStatus>>,
    summaries: DashMap<String, SummaryResponse>,
    non_chapters: DashMap<String, Vec<String>>,
    upload_response: Mutex<Option<UploadResponse>>,
    failures: Mutex<Vec<(ApiOperation, ApiError)>>,
    calls: Mutex<Vec<String>>,
    summary_delay: Mutex<Option<Duration>>,
}

impl FakeBookApi {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            statuses: DashMap::new(),
            summaries: DashMap::new(),
            non_chapters: DashMap::new(),
            upload_response: Mutex::new(None),
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            summary_delay: Mutex::new(None),
        }
    }

    pub fn add_book(&self, book: Book) {
        self.books.insert(book.id.clone(), book);
    }

    /// 追加一次状态响应
    pub fn push_status(&self, book_id: &str, status: BookStatus) {
        self.statuses
            .entry(book_id.to_string())
            .or_default()
            .push_back(status);
    }

    pub fn set_summary(&self, book_id: &str, section_id: Option<&str>, depth: Depth, summary: SummaryResponse) {
        self.summaries.insert(cache_key(book_id, section_id, depth), summary);
    }

    pub fn set_non_chapters(&self, book_id: &str, ids: Vec<String>) {
        self.non_chapters.insert(book_id.to_string(), ids);
    }

    pub fn set_upload_response(&self, response: UploadResponse) {
        *lock(&self.upload_response) = Some(response);
    }

    /// 下一次 operation 调用返回给定错误
    pub fn fail_next(&self, operation: ApiOperation, error: ApiError) {
        lock(&self.failures).push((operation, error));
    }

    /// 摘要请求的模拟延迟
    pub fn set_summary_delay(&self, delay: Duration) {
        *lock(&self.summary_delay) = Some(delay);
    }

    /// 所有调用，格式如 `GET /api/summary/b1?depth=2&section=ch-1`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// 以 prefix 开头的调用次数
    pub fn call_count(&self, prefix: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: String) {
        tracing::trace!(call = %call, "FakeBookApi call");
        lock(&self.calls).push(call);
    }

    fn take_failure(&self, operation: ApiOperation) -> Result<(), ApiError> {
        let mut failures = lock(&self.failures);
        match failures.iter().position(|(op, _)| *op == operation) {
            Some(index) => Err(failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn not_found(operation: ApiOperation, what: &str) -> ApiError {
        ApiError::status_error(operation, 404, format!("{} not found", what))
    }
}

impl Default for FakeBookApi {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl BookApiPort for FakeBookApi {
    async fn list_books(&self) -> Result<Vec<Book>, ApiError> {
        self.record("GET /api/books".to_string());
        self.take_failure(ApiOperation::ListBooks)?;
        let mut books: Vec<Book> = self.books.iter().map(|b| b.clone()).collect();
        books.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(books)
    }

    async fn get_book(&self, book_id: &str) -> Result<Book, ApiError> {
        self.record(format!("GET /api/books/{}", book_id));
        self.take_failure(ApiOperation::GetBook)?;
        self.books
            .get(book_id)
            .map(|b| b.clone())
            .ok_or_else(|| Self::not_found(ApiOperation::GetBook, "Book"))
    }

    async fn delete_book(&self, book_id: &str) -> Result<(), ApiError> {
        self.record(format!("DELETE /api/books/{}", book_id));
        self.take_failure(ApiOperation::DeleteBook)?;
        self.books
            .remove(book_id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(ApiOperation::DeleteBook, "Book"))
    }

    async fn upload_book(&self, file: &UploadFile) -> Result<UploadResponse, ApiError> {
        self.record(format!("POST /api/upload {}", file.file_name()));
        self.take_failure(ApiOperation::Upload)?;

        let response = lock(&self.upload_response).clone().unwrap_or_else(|| UploadResponse {
            book_id: uuid::Uuid::new_v4().to_string(),
            title: file.stem().to_string(),
            formats: vec!["text".to_string(), "markdown".to_string()],
            metadata: Default::default(),
        });
        self.add_book(Book {
            id: response.book_id.clone(),
            title: response.title.clone(),
            uploaded_at: Some(chrono::Utc::now().to_rfc3339()),
        });
        Ok(response)
    }

    async fn get_status(&self, book_id: &str) -> Result<BookStatus, ApiError> {
        self.record(format!("GET /api/books/{}/status", book_id));
        self.take_failure(ApiOperation::GetStatus)?;

        let mut queue = self
            .statuses
            .get_mut(book_id)
            .ok_or_else(|| Self::not_found(ApiOperation::GetStatus, "Book"))?;
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        status.ok_or_else(|| Self::not_found(ApiOperation::GetStatus, "Status"))
    }

    async fn fetch_summary(
        &self,
        book_id: &str,
        depth: Depth,
        section_id: Option<&str>,
    ) -> Result<SummaryResponse, ApiError> {
        let call = match section_id {
            Some(section) => format!("GET /api/summary/{}?depth={}&section={}", book_id, depth, section),
            None => format!("GET /api/summary/{}?depth={}", book_id, depth),
        };
        self.record(call);

        let delay = *lock(&self.summary_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.take_failure(ApiOperation::FetchSummary)?;
        self.summaries
            .get(&cache_key(book_id, section_id, depth))
            .map(|s| s.clone())
            .ok_or_else(|| Self::not_found(ApiOperation::FetchSummary, "Summary"))
    }

    async fn retry_chapter(&self, book_id: &str, chapter_id: &str) -> Result<RetryResponse, ApiError> {
        self.record(format!("POST /api/books/{}/chapters/{}/retry", book_id, chapter_id));
        self.take_failure(ApiOperation::RetryChapter)?;

        // 与后端一致：章节重新进入队列
        let mut queue = self
            .statuses
            .get_mut(book_id)
            .ok_or_else(|| Self::not_found(ApiOperation::RetryChapter, "Book"))?;
        let mut found = false;
        for status in queue.iter_mut() {
            found |= status.mark_pending(chapter_id);
        }
        if !found {
            return Err(ApiError::status_error(
                ApiOperation::RetryChapter,
                400,
                format!("Chapter {} not found", chapter_id),
            ));
        }

        Ok(RetryResponse {
            status: "queued".to_string(),
        })
    }

    async fn delete_chapter_summaries(
        &self,
        book_id: &str,
        chapter_id: &str,
    ) -> Result<ResummarizeResponse, ApiError> {
        self.record(format!("DELETE /api/books/{}/chapters/{}/summary", book_id, chapter_id));
        self.take_failure(ApiOperation::DeleteChapterSummaries)?;

        let prefix = format!("{}:{}:", book_id, chapter_id);
        let keys: Vec<String> = self
            .summaries
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| e.key().clone())
            .collect();
        for key in &keys {
            self.summaries.remove(key);
        }

        if let Some(mut queue) = self.statuses.get_mut(book_id) {
            for status in queue.iter_mut() {
                status.mark_pending(chapter_id);
            }
        }

        Ok(ResummarizeResponse {
            status: "success".to_string(),
            message: Some(format!("Deleted {} summary files", keys.len())),
            deleted_files: keys,
        })
    }

    async fn get_non_chapters(&self, book_id: &str) -> Result<Vec<String>, ApiError> {
        self.record(format!("GET /api/books/{}/non-chapters", book_id));
        self.take_failure(ApiOperation::GetNonChapters)?;
        Ok(self
            .non_chapters
            .get(book_id)
            .map(|ids| ids.clone())
            .unwrap_or_default())
    }
}
