//! Book Commands

use crate::domain::book::UploadFile;

/// 上传书籍命令
#[derive(Debug, Clone)]
pub struct UploadBook {
    pub file: UploadFile,
}

/// 删除书籍命令
#[derive(Debug, Clone)]
pub struct DeleteBook {
    pub book_id: String,
}
