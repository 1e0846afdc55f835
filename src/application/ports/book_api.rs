//! Book API Port - 摘要后端 HTTP 接口抽象
//!
//! 定义与外部摘要服务交互的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::book::{Book, BookStatus, UploadFile, UploadResponse};
use crate::domain::summary::{Depth, SummaryResponse};

/// 接口操作，用于错误信息前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    ListBooks,
    GetBook,
    DeleteBook,
    Upload,
    GetStatus,
    FetchSummary,
    RetryChapter,
    DeleteChapterSummaries,
    GetNonChapters,
}

impl ApiOperation {
    /// 面向用户的失败提示
    pub fn failure_message(&self) -> &'static str {
        match self {
            ApiOperation::ListBooks => "Failed to fetch books",
            ApiOperation::GetBook => "Failed to fetch book",
            ApiOperation::DeleteBook => "Failed to delete book",
            ApiOperation::Upload => "Upload failed",
            ApiOperation::GetStatus => "Failed to get status",
            ApiOperation::FetchSummary => "Failed to fetch summary",
            ApiOperation::RetryChapter => "Failed to retry chapter",
            ApiOperation::DeleteChapterSummaries => "Failed to re-summarize chapter",
            ApiOperation::GetNonChapters => "Failed to get non-chapters",
        }
    }
}

impl std::fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.failure_message())
    }
}

/// Book API 错误
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{operation}: {message}")]
    Network {
        operation: ApiOperation,
        message: String,
    },

    #[error("{operation}: request timed out")]
    Timeout { operation: ApiOperation },

    #[error("{operation}: {message}")]
    Status {
        operation: ApiOperation,
        status: u16,
        message: String,
    },

    #[error("{operation}: invalid response: {message}")]
    InvalidResponse {
        operation: ApiOperation,
        message: String,
    },
}

impl ApiError {
    pub fn operation(&self) -> ApiOperation {
        match self {
            ApiError::Network { operation, .. }
            | ApiError::Timeout { operation }
            | ApiError::Status { operation, .. }
            | ApiError::InvalidResponse { operation, .. } => *operation,
        }
    }

    /// HTTP 状态码（仅非 2xx 响应）
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn status_error(operation: ApiOperation, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            operation,
            status,
            message: message.into(),
        }
    }
}

/// 重试响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryResponse {
    pub status: String,
}

/// 删除章节摘要（重新生成）响应
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResummarizeResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub deleted_files: Vec<String>,
}

/// Book API Port
///
/// 外部摘要服务的抽象接口
#[async_trait]
pub trait BookApiPort: Send + Sync {
    /// GET /api/books
    async fn list_books(&self) -> Result<Vec<Book>, ApiError>;

    /// GET /api/books/{book_id}
    async fn get_book(&self, book_id: &str) -> Result<Book, ApiError>;

    /// DELETE /api/books/{book_id}
    async fn delete_book(&self, book_id: &str) -> Result<(), ApiError>;

    /// POST /api/upload（multipart 字段 `file`）
    async fn upload_book(&self, file: &UploadFile) -> Result<UploadResponse, ApiError>;

    /// GET /api/books/{book_id}/status
    async fn get_status(&self, book_id: &str) -> Result<BookStatus, ApiError>;

    /// GET /api/summary/{book_id}?depth={n}&section={section_id}
    ///
    /// section_id 为 None 时请求整本书的摘要
    async fn fetch_summary(
        &self,
        book_id: &str,
        depth: Depth,
        section_id: Option<&str>,
    ) -> Result<SummaryResponse, ApiError>;

    /// POST /api/books/{book_id}/chapters/{chapter_id}/retry
    async fn retry_chapter(&self, book_id: &str, chapter_id: &str) -> Result<RetryResponse, ApiError>;

    /// DELETE /api/books/{book_id}/chapters/{chapter_id}/summary
    async fn delete_chapter_summaries(
        &self,
        book_id: &str,
        chapter_id: &str,
    ) -> Result<ResummarizeResponse, ApiError>;

    /// GET /api/books/{book_id}/non-chapters
    async fn get_non_chapters(&self, book_id: &str) -> Result<Vec<String>, ApiError>;
}
