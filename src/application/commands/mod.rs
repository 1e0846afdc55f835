//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：处理所有用户发起的写操作

mod book_commands;
mod chapter_commands;

pub mod handlers;

pub use book_commands::*;
pub use chapter_commands::*;
