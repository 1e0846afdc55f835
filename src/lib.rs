//! Booksum - 书籍摘要服务客户端
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 书籍、章节状态、上传校验
//! - Summary Context: 摘要深度、摘要树（arena 存储）
//!
//! 应用层 (application/):
//! - Ports: 端口定义（BookApi, SummaryCache, StatusStore, PollingControl）
//! - Commands: 上传、删除、章节重试、重新生成
//! - Queries: 书籍列表、详情、处理状态
//! - View-Models: 摘要树展开、书籍列表
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP Book API 客户端、测试用 Fake
//! - Memory: 摘要缓存、状态快照内存实现
//! - Worker: 状态轮询任务
//! - Events: 客户端事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
