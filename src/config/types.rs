//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::time::Duration;

use crate::domain::book::{UploadPolicy, DEFAULT_MAX_UPLOAD_SIZE};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 摘要后端配置
    #[serde(default)]
    pub api: ApiConfig,

    /// 状态轮询配置
    #[serde(default)]
    pub poll: PollConfig,

    /// 摘要缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 上传校验配置
    #[serde(default)]
    pub upload: UploadConfig,

    /// 摘要树配置
    #[serde(default)]
    pub summary: SummaryConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 摘要后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 后端基础 URL
    #[serde(default = "default_api_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_timeout() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

/// 状态轮询配置
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// 轮询间隔（毫秒）
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    2000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// 摘要缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 条目过期时间（秒），默认 24 小时
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    86400
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 上传校验配置
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// 上传文件最大大小（字节），默认 100MB
    #[serde(default = "default_max_upload_size")]
    pub max_size_bytes: u64,

    /// 允许的扩展名（不含点）
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_upload_size() -> u64 {
    DEFAULT_MAX_UPLOAD_SIZE
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "epub".to_string(), "mobi".to_string()]
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_upload_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl UploadConfig {
    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_size_bytes: self.max_size_bytes,
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }
}

/// 摘要树配置
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    /// 允许展开到的最大深度（1-4）
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
}

fn default_max_depth() -> u8 {
    4
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
