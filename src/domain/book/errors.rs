//! Book Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("File is too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),
}
