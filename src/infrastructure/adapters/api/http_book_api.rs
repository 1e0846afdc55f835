//! HTTP Book API - 调用外部摘要服务
//!
//! 实现 BookApiPort trait，通过 HTTP 调用摘要后端
//!
//! 所有响应在这里规范化：
//! - 摘要正文字段 `text` / `content` 统一为 `content`
//! - 子节点字段 `sections` / `children` 统一为 `children`
//! - 错误响应体中的 `detail` / `message` / `error` 字段提取为错误消息

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::application::ports::{
    ApiError, ApiOperation, BookApiPort, ResummarizeResponse, RetryResponse,
};
use crate::domain::book::{Book, BookStatus, UploadFile, UploadResponse};
use crate::domain::summary::{Depth, SectionStub, SummaryResponse};

/// 错误消息最大长度（原始响应体可能是 HTML 页面）
const MAX_ERROR_BODY_CHARS: usize = 300;

/// HTTP Book API 配置
#[derive(Debug, Clone)]
pub struct HttpBookApiConfig {
    /// 摘要服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpBookApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 60,
        }
    }
}

impl HttpBookApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// 摘要接口的原始响应
///
/// 不同版本的后端字段命名不一致，这里全部接收后再规范化
#[derive(Debug, Default, Deserialize)]
struct SummaryWire {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sections: Option<Vec<SectionStub>>,
    #[serde(default)]
    children: Option<Vec<SectionStub>>,
}

impl From<SummaryWire> for SummaryResponse {
    fn from(wire: SummaryWire) -> Self {
        let content = wire
            .text
            .filter(|t| !t.is_empty())
            .or(wire.content)
            .unwrap_or_default();
        let children = wire.sections.or(wire.children).unwrap_or_default();
        SummaryResponse { content, children }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NonChaptersWire {
    List(Vec<String>),
    Wrapped {
        #[serde(default)]
        non_chapters: Vec<String>,
    },
}

impl From<NonChaptersWire> for Vec<String> {
    fn from(wire: NonChaptersWire) -> Self {
        match wire {
            NonChaptersWire::List(ids) => ids,
            NonChaptersWire::Wrapped { non_chapters } => non_chapters,
        }
    }
}

/// HTTP Book API 客户端
pub struct HttpBookApi {
    client: Client,
    base_url: Url,
}

impl HttpBookApi {
    /// 创建新的客户端
    pub fn new(config: HttpBookApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network {
                operation: ApiOperation::ListBooks,
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::Network {
                operation: ApiOperation::ListBooks,
                message: format!("Invalid base URL: {}", config.base_url),
            })?;

        Ok(Self { client, base_url })
    }

    /// 拼接接口地址，每个路径段单独编码（id 中的 `/`、`?`、`#` 不会改变路径）
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// 发送请求并检查状态码
    async fn send(&self, operation: ApiOperation, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        tracing::warn!(
            operation = ?operation,
            status = status.as_u16(),
            error = %message,
            "Summary service returned error"
        );

        Err(ApiError::status_error(operation, status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: ApiOperation,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(operation, request).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout { operation }
            } else {
                ApiError::InvalidResponse {
                    operation,
                    message: e.to_string(),
                }
            }
        })
    }
}

fn transport_error(operation: ApiOperation, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout { operation }
    } else if e.is_connect() {
        ApiError::Network {
            operation,
            message: format!("Cannot connect to summary service: {}", e),
        }
    } else {
        ApiError::Network {
            operation,
            message: e.to_string(),
        }
    }
}

/// 从错误响应体提取消息
///
/// JSON 对象取 `detail` / `message` / `error` 字符串字段；
/// 非 JSON 的响应体原样返回（截断）；都没有则返回 None
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => ["detail", "message", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        Ok(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Ok(_) => None,
        Err(_) => Some(trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()),
    }
}

#[async_trait]
impl BookApiPort for HttpBookApi {
    async fn list_books(&self) -> Result<Vec<Book>, ApiError> {
        let url = self.endpoint(&["api", "books"]);
        tracing::debug!(url = %url, "Fetching books");
        self.send_json(ApiOperation::ListBooks, self.client.get(url.clone())).await
    }

    async fn get_book(&self, book_id: &str) -> Result<Book, ApiError> {
        let url = self.endpoint(&["api", "books", book_id]);
        tracing::debug!(url = %url, book_id = %book_id, "Fetching book details");
        self.send_json(ApiOperation::GetBook, self.client.get(url.clone())).await
    }

    async fn delete_book(&self, book_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "books", book_id]);
        self.send(ApiOperation::DeleteBook, self.client.delete(url.clone())).await?;
        tracing::info!(book_id = %book_id, "Book deleted");
        Ok(())
    }

    async fn upload_book(&self, file: &UploadFile) -> Result<UploadResponse, ApiError> {
        let url = self.endpoint(&["api", "upload"]);
        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.file_name().to_string())
            .mime_str(file.mime_type())
            .map_err(|e| ApiError::InvalidResponse {
                operation: ApiOperation::Upload,
                message: format!("Invalid content type: {}", e),
            })?;
        let form = Form::new().part("file", part);

        tracing::debug!(
            url = %url,
            file_name = %file.file_name(),
            size = file.size(),
            "Uploading book"
        );

        let response: UploadResponse = self
            .send_json(ApiOperation::Upload, self.client.post(url.clone()).multipart(form))
            .await?;

        tracing::info!(
            book_id = %response.book_id,
            title = %response.title,
            chapters = response.metadata.chapters.len(),
            "Book uploaded"
        );
        Ok(response)
    }

    async fn get_status(&self, book_id: &str) -> Result<BookStatus, ApiError> {
        let url = self.endpoint(&["api", "books", book_id, "status"]);
        let status: BookStatus = self
            .send_json(ApiOperation::GetStatus, self.client.get(url.clone()))
            .await?;
        tracing::debug!(
            book_id = %book_id,
            completed = status.completed_chapters,
            total = status.total_chapters,
            "Book status received"
        );
        Ok(status)
    }

    async fn fetch_summary(
        &self,
        book_id: &str,
        depth: Depth,
        section_id: Option<&str>,
    ) -> Result<SummaryResponse, ApiError> {
        let url = self.endpoint(&["api", "summary", book_id]);
        let mut query = vec![("depth", depth.to_string())];
        if let Some(section) = section_id {
            query.push(("section", section.to_string()));
        }

        tracing::debug!(
            url = %url,
            depth = %depth,
            section_id = ?section_id,
            "Fetching summary"
        );

        let wire: SummaryWire = self
            .send_json(ApiOperation::FetchSummary, self.client.get(url.clone()).query(&query))
            .await?;
        Ok(wire.into())
    }

    async fn retry_chapter(&self, book_id: &str, chapter_id: &str) -> Result<RetryResponse, ApiError> {
        let url = self.endpoint(&["api", "books", book_id, "chapters", chapter_id, "retry"]);
        let response: RetryResponse = self
            .send_json(ApiOperation::RetryChapter, self.client.post(url.clone()))
            .await?;
        tracing::info!(book_id = %book_id, chapter_id = %chapter_id, status = %response.status, "Chapter retry queued");
        Ok(response)
    }

    async fn delete_chapter_summaries(
        &self,
        book_id: &str,
        chapter_id: &str,
    ) -> Result<ResummarizeResponse, ApiError> {
        let url = self.endpoint(&["api", "books", book_id, "chapters", chapter_id, "summary"]);
        let response: ResummarizeResponse = self
            .send_json(ApiOperation::DeleteChapterSummaries, self.client.delete(url.clone()))
            .await?;
        tracing::info!(
            book_id = %book_id,
            chapter_id = %chapter_id,
            deleted = response.deleted_files.len(),
            "Chapter summaries deleted"
        );
        Ok(response)
    }

    async fn get_non_chapters(&self, book_id: &str) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["api", "books", book_id, "non-chapters"]);
        let wire: NonChaptersWire = self
            .send_json(ApiOperation::GetNonChapters, self.client.get(url.clone()))
            .await?;
        Ok(wire.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpBookApiConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_config_builder() {
        let config = HttpBookApiConfig::new("http://example.com:9000").with_timeout(5);
        assert_eq!(config.base_url, "http://example.com:9000");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let api = HttpBookApi::new(HttpBookApiConfig::new("http://example.com/")).unwrap();
        assert_eq!(api.endpoint(&["api", "books"]).as_str(), "http://example.com/api/books");

        let api = HttpBookApi::new(HttpBookApiConfig::new("http://example.com/summarizer/")).unwrap();
        assert_eq!(
            api.endpoint(&["api", "books"]).as_str(),
            "http://example.com/summarizer/api/books"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let api = HttpBookApi::new(HttpBookApiConfig::new("http://example.com")).unwrap();
        let url = api.endpoint(&["api", "books", "shelf/b1?x#y", "status"]);
        assert_eq!(url.as_str(), "http://example.com/api/books/shelf%2Fb1%3Fx%23y/status");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(HttpBookApi::new(HttpBookApiConfig::new("localhost:8000")).is_err());
        assert!(HttpBookApi::new(HttpBookApiConfig::new("not a url")).is_err());
    }

    #[test]
    fn test_summary_prefers_text_then_content() {
        let wire: SummaryWire =
            serde_json::from_str(r#"{"text": "from text", "content": "from content"}"#).unwrap();
        assert_eq!(SummaryResponse::from(wire).content, "from text");

        let wire: SummaryWire =
            serde_json::from_str(r#"{"text": "", "content": "from content"}"#).unwrap();
        assert_eq!(SummaryResponse::from(wire).content, "from content");

        let wire: SummaryWire = serde_json::from_str(r#"{"text": null}"#).unwrap();
        let summary = SummaryResponse::from(wire);
        assert_eq!(summary.content, "");
        assert!(summary.children.is_empty());
    }

    #[test]
    fn test_summary_children_keep_order() {
        let wire: SummaryWire = serde_json::from_str(
            r#"{"text": "t", "sections": [{"id": "s-2", "title": "B"}, {"id": "s-1", "title": "A"}]}"#,
        )
        .unwrap();
        let ids: Vec<String> = SummaryResponse::from(wire)
            .children
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["s-2", "s-1"]);

        let wire: SummaryWire =
            serde_json::from_str(r#"{"content": "c", "children": [{"id": "x"}]}"#).unwrap();
        let summary = SummaryResponse::from(wire);
        assert_eq!(summary.children, vec![SectionStub::new("x", "")]);
    }

    #[test]
    fn test_non_chapters_shapes() {
        let wrapped: NonChaptersWire =
            serde_json::from_str(r#"{"non_chapters": ["chapter-0"]}"#).unwrap();
        assert_eq!(Vec::<String>::from(wrapped), vec!["chapter-0"]);

        let list: NonChaptersWire = serde_json::from_str(r#"["chapter-0", "chapter-9"]"#).unwrap();
        assert_eq!(Vec::<String>::from(list).len(), 2);
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"detail": "Book not found"}"#).as_deref(),
            Some("Book not found")
        );
        assert_eq!(
            extract_error_message(r#"{"message": "File too large"}"#).as_deref(),
            Some("File too large")
        );
        assert_eq!(
            extract_error_message("upstream exploded").as_deref(),
            Some("upstream exploded")
        );
        // FastAPI 校验错误的 detail 是数组
        assert_eq!(extract_error_message(r#"{"detail": [{"loc": ["query"]}]}"#), None);
        assert_eq!(extract_error_message("   "), None);
    }

    #[test]
    fn test_extract_error_message_truncates() {
        let body = "x".repeat(1000);
        assert_eq!(
            extract_error_message(&body).map(|m| m.len()),
            Some(MAX_ERROR_BODY_CHARS)
        );
    }
}
