//! 应用层错误定义
//!
//! 统一的命令/查询/视图模型错误类型

use thiserror::Error;

use crate::application::ports::ApiError;
use crate::domain::book::BookError;
use crate::domain::summary::SummaryError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误（请求发出之前）
    #[error("{0}")]
    ValidationError(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 外部服务错误
    #[error("{0}")]
    ExternalServiceError(#[from] ApiError),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// 是否为外部服务返回的错误
    pub fn is_external(&self) -> bool {
        matches!(self, Self::ExternalServiceError(_))
    }
}

impl From<BookError> for ApplicationError {
    fn from(err: BookError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<SummaryError> for ApplicationError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::SectionNotFound(id) => Self::not_found("Section", id),
            other => Self::InvalidState(other.to_string()),
        }
    }
}
