//! Book API Adapter - 摘要后端客户端实现

mod fake_book_api;
mod http_book_api;

pub use fake_book_api::FakeBookApi;
pub use http_book_api::*;
