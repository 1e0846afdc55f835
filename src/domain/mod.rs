//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Book Context: 书籍、章节状态、上传校验
//! - Summary Context: 摘要深度与摘要树

pub mod book;
pub mod summary;
