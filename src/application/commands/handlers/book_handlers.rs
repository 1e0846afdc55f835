//! Book Command Handlers

use std::sync::Arc;

use crate::application::commands::{DeleteBook, UploadBook};
use crate::application::error::ApplicationError;
use crate::application::ports::{BookApiPort, StatusStorePort};
use crate::domain::book::{UploadPolicy, UploadResponse};
use crate::infrastructure::events::EventPublisher;

// ============================================================================
// UploadBook
// ============================================================================

/// UploadBook Handler - 本地校验后上传
pub struct UploadBookHandler {
    api: Arc<dyn BookApiPort>,
    policy: UploadPolicy,
    event_publisher: Arc<EventPublisher>,
}

impl UploadBookHandler {
    pub fn new(api: Arc<dyn BookApiPort>, policy: UploadPolicy, event_publisher: Arc<EventPublisher>) -> Self {
        Self {
            api,
            policy,
            event_publisher,
        }
    }

    pub async fn handle(&self, command: UploadBook) -> Result<UploadResponse, ApplicationError> {
        let file = command.file;

        // 不合格的文件不发请求
        if let Err(e) = self.policy.validate(&file) {
            tracing::warn!(file_name = %file.file_name(), size = file.size(), error = %e, "Upload rejected");
            self.event_publisher.notify_error(e.to_string());
            return Err(e.into());
        }

        let response = match self.api.upload_book(&file).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(file_name = %file.file_name(), error = %e, "Upload failed");
                self.event_publisher.notify_error(e.to_string());
                return Err(e.into());
            }
        };

        tracing::info!(
            book_id = %response.book_id,
            title = %response.title,
            size = file.size(),
            chapters = response.metadata.chapters.len(),
            "Book uploaded"
        );

        self.event_publisher
            .publish_book_uploaded(&response.book_id, &response.title);
        self.event_publisher
            .notify_success(format!("Uploaded \"{}\"", response.title));

        Ok(response)
    }
}

// ============================================================================
// DeleteBook
// ============================================================================

/// DeleteBook Handler
pub struct DeleteBookHandler {
    api: Arc<dyn BookApiPort>,
    status_store: Arc<dyn StatusStorePort>,
    event_publisher: Arc<EventPublisher>,
}

impl DeleteBookHandler {
    pub fn new(
        api: Arc<dyn BookApiPort>,
        status_store: Arc<dyn StatusStorePort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            api,
            status_store,
            event_publisher,
        }
    }

    pub async fn handle(&self, command: DeleteBook) -> Result<(), ApplicationError> {
        if let Err(e) = self.api.delete_book(&command.book_id).await {
            tracing::error!(book_id = %command.book_id, error = %e, "Delete failed");
            self.event_publisher.notify_error(e.to_string());
            if e.status() == Some(404) {
                return Err(ApplicationError::not_found("Book", command.book_id));
            }
            return Err(e.into());
        }

        self.status_store.remove(&command.book_id);
        self.event_publisher.publish_book_deleted(&command.book_id);
        self.event_publisher.notify_success("Book deleted");
        self.event_publisher.unregister_book(&command.book_id);

        tracing::info!(book_id = %command.book_id, "Book deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ApiError, ApiOperation};
    use crate::domain::book::{Book, BookStatus, UploadFile};
    use crate::infrastructure::adapters::FakeBookApi;
    use crate::infrastructure::events::{ClientEvent, NotificationLevel};
    use crate::infrastructure::memory::InMemoryStatusStore;

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_upload_success() {
        let api = Arc::new(FakeBookApi::new());
        api.set_upload_response(UploadResponse {
            book_id: "b1".to_string(),
            title: "Moby Dick".to_string(),
            formats: vec!["text".to_string()],
            metadata: Default::default(),
        });
        let events = Arc::new(EventPublisher::new());
        let mut rx = events.subscribe_global();
        let handler = UploadBookHandler::new(api.clone(), UploadPolicy::default(), events);

        let response = handler
            .handle(UploadBook {
                file: UploadFile::new("moby-dick.epub", vec![0u8; 128]),
            })
            .await
            .unwrap();

        assert_eq!(response.book_id, "b1");
        assert_eq!(api.calls(), vec!["POST /api/upload moby-dick.epub".to_string()]);
        let events = drain(&mut rx);
        assert!(events.contains(&ClientEvent::BookUploaded {
            book_id: "b1".to_string(),
            title: "Moby Dick".to_string(),
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            ClientEvent::Notification { level: NotificationLevel::Success, .. }
        )));
    }

    #[tokio::test]
    async fn test_upload_rejected_before_request() {
        let api = Arc::new(FakeBookApi::new());
        let events = Arc::new(EventPublisher::new());
        let mut rx = events.subscribe_global();
        let policy = UploadPolicy {
            max_size_bytes: 16,
            ..UploadPolicy::default()
        };
        let handler = UploadBookHandler::new(api.clone(), policy, events);

        let err = handler
            .handle(UploadBook {
                file: UploadFile::new("big.pdf", vec![0u8; 17]),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));

        let err = handler
            .handle(UploadBook {
                file: UploadFile::new("notes.txt", vec![0u8; 4]),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported file format"));

        assert!(api.calls().is_empty());
        let errors = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ClientEvent::Notification { level: NotificationLevel::Error, .. }))
            .count();
        assert_eq!(errors, 2);
    }

    #[tokio::test]
    async fn test_upload_backend_failure_message() {
        let api = Arc::new(FakeBookApi::new());
        api.fail_next(
            ApiOperation::Upload,
            ApiError::status_error(ApiOperation::Upload, 422, "Could not extract chapters"),
        );
        let handler = UploadBookHandler::new(api, UploadPolicy::default(), Arc::new(EventPublisher::new()));

        let err = handler
            .handle(UploadBook {
                file: UploadFile::new("broken.pdf", vec![1, 2, 3]),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upload failed: Could not extract chapters");
    }

    #[tokio::test]
    async fn test_delete_book() {
        let api = Arc::new(FakeBookApi::new());
        api.add_book(Book {
            id: "b1".to_string(),
            title: "Moby Dick".to_string(),
            uploaded_at: None,
        });
        let store = Arc::new(InMemoryStatusStore::new());
        store.put_status("b1", BookStatus::default());
        let events = Arc::new(EventPublisher::new());
        let mut rx = events.subscribe_global();
        let handler = DeleteBookHandler::new(api.clone(), store.clone(), events);

        handler
            .handle(DeleteBook {
                book_id: "b1".to_string(),
            })
            .await
            .unwrap();
        assert!(store.get("b1").is_none());
        assert!(drain(&mut rx).contains(&ClientEvent::BookDeleted {
            book_id: "b1".to_string()
        }));

        let err = handler
            .handle(DeleteBook {
                book_id: "b1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }
}
