//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（BookApi、SummaryCache、StatusStore、PollingControl）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - view_models: 展示层状态（摘要树、书籍列表）
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod view_models;

// Re-exports
pub use commands::{
    // Book commands
    DeleteBook,
    UploadBook,
    // Chapter commands
    ResummarizeChapter,
    RetryChapter,
    // Handlers
    handlers::{
        DeleteBookHandler, ResummarizeChapterHandler, ResummarizeChapterResponse, RetryChapterHandler,
        RetryChapterResponse, UploadBookHandler,
    },
};

pub use error::ApplicationError;

pub use ports::{
    // Book API
    ApiError,
    ApiOperation,
    BookApiPort,
    ResummarizeResponse,
    RetryResponse,
    // Polling
    NoopPollingControl,
    PollPhase,
    PollingControlPort,
    // Status store
    StatusSnapshot,
    StatusStorePort,
    // Summary cache
    cache_key,
    CacheEntry,
    SummaryCachePort,
    DEFAULT_CACHE_TTL_MS,
};

pub use queries::{
    GetBook,
    GetBookStatus,
    GetNonChapters,
    ListBooks,
    // Handlers
    handlers::{
        BookStatusResponse, GetBookHandler, GetBookStatusHandler, GetNonChaptersHandler, ListBooksHandler,
    },
};

pub use view_models::{BookListViewModel, ContentSource, ExpandOutcome, SummaryTreeViewModel};
