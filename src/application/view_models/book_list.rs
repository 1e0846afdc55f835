//! Book List View-Model

use std::sync::{Arc, RwLock};

use crate::application::error::ApplicationError;
use crate::application::ports::BookApiPort;
use crate::application::queries::{handlers::ListBooksHandler, ListBooks};
use crate::domain::book::Book;

#[derive(Debug, Clone, Default)]
struct BookListState {
    books: Vec<Book>,
    error: Option<String>,
}

/// 书籍列表状态
///
/// 刷新失败时保留上一次的列表，只记录错误
pub struct BookListViewModel {
    list_books: ListBooksHandler,
    state: RwLock<BookListState>,
}

impl BookListViewModel {
    pub fn new(api: Arc<dyn BookApiPort>) -> Self {
        Self {
            list_books: ListBooksHandler::new(api),
            state: RwLock::new(BookListState::default()),
        }
    }

    /// 从后端重新拉取列表
    pub async fn refresh(&self) -> Result<usize, ApplicationError> {
        match self.list_books.handle(ListBooks).await {
            Ok(books) => {
                let count = books.len();
                self.with_state(|state| {
                    state.books = books;
                    state.error = None;
                });
                tracing::debug!(count = count, "Book list refreshed");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh book list");
                self.with_state(|state| state.error = Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// 上传完成后插入到列表最前，已存在则移到最前
    pub fn add(&self, book: Book) {
        self.with_state(|state| {
            state.books.retain(|b| b.id != book.id);
            state.books.insert(0, book);
        });
    }

    /// 删除完成后从列表移除
    pub fn remove(&self, book_id: &str) -> bool {
        self.with_state(|state| {
            let before = state.books.len();
            state.books.retain(|b| b.id != book_id);
            state.books.len() != before
        })
    }

    pub fn books(&self) -> Vec<Book> {
        self.read(|state| state.books.clone())
    }

    pub fn error(&self) -> Option<String> {
        self.read(|state| state.error.clone())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BookListState) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn read<R>(&self, f: impl FnOnce(&BookListState) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }
}
