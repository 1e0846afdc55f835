//! Book Context - Upload

use std::path::Path;

use super::BookError;

/// 默认最大上传大小 100MB
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// 待上传的书籍文件
#[derive(Debug, Clone)]
pub struct UploadFile {
    file_name: String,
    bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// 从磁盘读取文件
    pub async fn from_path(path: &Path) -> Result<Self, BookError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BookError::InvalidUpload(format!("Invalid file path: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BookError::FileReadError(format!("{}: {}", path.display(), e)))?;
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// 小写扩展名（不含点）
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// 根据扩展名推断 MIME 类型
    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("pdf") => "application/pdf",
            Some("epub") => "application/epub+zip",
            Some("mobi") => "application/x-mobipocket-ebook",
            _ => "application/octet-stream",
        }
    }

    /// 去掉扩展名的文件名，作为默认书名
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

/// 上传校验策略，在发出请求之前执行
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_UPLOAD_SIZE,
            allowed_extensions: vec!["pdf".to_string(), "epub".to_string(), "mobi".to_string()],
        }
    }
}

impl UploadPolicy {
    pub fn validate(&self, file: &UploadFile) -> Result<(), BookError> {
        if file.size() == 0 {
            return Err(BookError::InvalidUpload("File is empty".to_string()));
        }

        if file.size() > self.max_size_bytes {
            return Err(BookError::FileTooLarge {
                size: file.size(),
                max: self.max_size_bytes,
            });
        }

        if !self.allowed_extensions.is_empty() {
            let allowed = file
                .extension()
                .map(|ext| self.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
                .unwrap_or(false);
            if !allowed {
                return Err(BookError::UnsupportedFormat(file.file_name().to_string()));
            }
        }

        Ok(())
    }
}
