//! Book Queries

/// 列出所有书籍
#[derive(Debug, Clone)]
pub struct ListBooks;

/// 获取书籍详情
#[derive(Debug, Clone)]
pub struct GetBook {
    pub book_id: String,
}

/// 获取书籍处理状态
#[derive(Debug, Clone)]
pub struct GetBookStatus {
    pub book_id: String,
    /// 忽略本地快照，强制请求后端
    pub force_refresh: bool,
}

/// 获取不计入章节进度的 section id
#[derive(Debug, Clone)]
pub struct GetNonChapters {
    pub book_id: String,
}
