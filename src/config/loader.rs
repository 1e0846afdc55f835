//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::domain::book::DEFAULT_MAX_UPLOAD_SIZE;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BOOKSUM_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BOOKSUM_API__URL=http://summarizer:8000`
/// - `BOOKSUM_POLL__INTERVAL_MS=5000`
/// - `BOOKSUM_UPLOAD__ALLOWED_EXTENSIONS=pdf,epub`
/// - `BOOKSUM_LOG__LEVEL=debug`
///
/// # 返回
/// - `Ok(AppConfig)` - 成功加载的配置
/// - `Err(ConfigError)` - 加载失败
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("api.url", "http://localhost:8000")?
        .set_default("api.timeout_secs", 60)?
        .set_default("poll.interval_ms", 2000)?
        .set_default("cache.ttl_secs", 86400)?
        .set_default("upload.max_size_bytes", DEFAULT_MAX_UPLOAD_SIZE)?
        .set_default("upload.allowed_extensions", vec!["pdf", "epub", "mobi"])?
        .set_default("summary.max_depth", 4)?
        .set_default("log.level", "warn")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: BOOKSUM_
    // 层级分隔符: __ (双下划线)
    // 例如: BOOKSUM_API__URL=http://summarizer:8000
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("BOOKSUM")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("upload.allowed_extensions")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    // 验证后端 URL
    if config.api.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "API URL cannot be empty".to_string(),
        ));
    }
    if !config.api.url.starts_with("http://") && !config.api.url.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "API URL must start with http:// or https://: {}",
            config.api.url
        )));
    }

    if config.api.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "API timeout cannot be 0".to_string(),
        ));
    }

    if config.poll.interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Poll interval cannot be 0".to_string(),
        ));
    }

    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Cache TTL cannot be 0".to_string(),
        ));
    }

    if config.upload.max_size_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "Upload size limit cannot be 0".to_string(),
        ));
    }

    // 验证摘要深度
    if !(1..=4).contains(&config.summary.max_depth) {
        return Err(ConfigError::ValidationError(format!(
            "Summary max depth must be between 1 and 4, got {}",
            config.summary.max_depth
        )));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("API URL: {}", config.api.url);
    tracing::info!("API Timeout: {}s", config.api.timeout_secs);
    tracing::info!("Poll Interval: {}ms", config.poll.interval_ms);
    tracing::info!("Cache TTL: {}s", config.cache.ttl_secs);
    tracing::info!("Upload Max Size: {} bytes", config.upload.max_size_bytes);
    tracing::info!("Upload Extensions: {}", config.upload.allowed_extensions.join(", "));
    tracing::info!("Summary Max Depth: {}", config.summary.max_depth);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_api_url() {
        let mut config = AppConfig::default();
        config.api.url = String::new();
        assert!(validate_config(&config).is_err());

        config.api.url = "localhost:8000".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_interval() {
        let mut config = AppConfig::default();
        config.poll.interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_max_depth() {
        let mut config = AppConfig::default();
        config.summary.max_depth = 5;
        assert!(validate_config(&config).is_err());
        config.summary.max_depth = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
url = "https://summarizer.example.com"

[poll]
interval_ms = 5000

[upload]
allowed_extensions = ["pdf"]
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.api.url, "https://summarizer.example.com");
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.poll.interval_ms, 5000);
        assert_eq!(config.upload.allowed_extensions, vec!["pdf".to_string()]);
        assert_eq!(config.summary.max_depth, 4);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[summary]\nmax_depth = 9").unwrap();

        let err = load_config_from_path(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
