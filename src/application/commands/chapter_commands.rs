//! Chapter Commands

/// 重试失败章节命令
#[derive(Debug, Clone)]
pub struct RetryChapter {
    pub book_id: String,
    pub chapter_id: String,
}

/// 删除章节摘要并重新生成命令
#[derive(Debug, Clone)]
pub struct ResummarizeChapter {
    pub book_id: String,
    pub chapter_id: String,
}
