//! Memory Layer - In-Memory State Management
//!
//! 实现 SummaryCache 和 StatusStore，只在当前进程内有效，不做持久化

mod status_store;
mod summary_cache;

pub use status_store::InMemoryStatusStore;
pub use summary_cache::{InMemorySummaryCache, SummaryCacheStats};
