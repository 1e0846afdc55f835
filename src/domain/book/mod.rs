//! Book Context - 书籍限界上下文
//!
//! 职责:
//! - 书籍列表条目与上传响应
//! - 章节处理状态与轮询终止条件
//! - 上传前的本地校验

mod entities;
mod errors;
mod upload;

pub use entities::{
    Book, BookMetadata, BookStatus, ChapterOutline, ChapterState, ChapterStatus, UploadResponse,
};
pub use errors::BookError;
pub use upload::{UploadFile, UploadPolicy, DEFAULT_MAX_UPLOAD_SIZE};
