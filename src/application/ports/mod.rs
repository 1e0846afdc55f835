//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod book_api;
mod polling;
mod status_store;
mod summary_cache;

pub use book_api::{ApiError, ApiOperation, BookApiPort, ResummarizeResponse, RetryResponse};
pub use polling::{NoopPollingControl, PollPhase, PollingControlPort};
pub use status_store::{StatusSnapshot, StatusStorePort};
pub use summary_cache::{cache_key, CacheEntry, SummaryCachePort, DEFAULT_CACHE_TTL_MS};
