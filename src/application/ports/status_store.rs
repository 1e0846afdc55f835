//! Status Store Port - 书籍处理状态的本地快照
//!
//! 保存每本书最近一次拉取到的状态，供查询复用；
//! 重试或重新生成摘要后通过 invalidate 标记为过期

use chrono::{DateTime, Utc};

use crate::domain::book::BookStatus;

/// 单本书的状态快照
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub status: Option<BookStatus>,
    /// 最近一次拉取失败的错误
    pub error: Option<String>,
    pub non_chapters: Option<Vec<String>>,
    /// 被 invalidate 后为 true，下一次查询需要重新拉取
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// 排除 non-chapter 后的进度 (completed, total)
    pub fn progress(&self) -> Option<(usize, usize)> {
        let status = self.status.as_ref()?;
        let non_chapters = self.non_chapters.as_deref().unwrap_or(&[]);
        Some(status.progress(non_chapters))
    }
}

/// Status Store Port
pub trait StatusStorePort: Send + Sync {
    /// 写入最新状态，清除错误与过期标记
    fn put_status(&self, book_id: &str, status: BookStatus);

    /// 记录拉取失败，保留之前的状态
    fn record_error(&self, book_id: &str, error: String);

    fn put_non_chapters(&self, book_id: &str, ids: Vec<String>);

    fn get(&self, book_id: &str) -> Option<StatusSnapshot>;

    /// 标记为过期，返回是否存在快照
    fn invalidate(&self, book_id: &str) -> bool;

    /// 删除快照
    fn remove(&self, book_id: &str);

    /// 新鲜（非过期）的状态
    fn fresh_status(&self, book_id: &str) -> Option<BookStatus> {
        self.get(book_id)
            .filter(|s| !s.stale)
            .and_then(|s| s.status)
    }

    fn non_chapters(&self, book_id: &str) -> Option<Vec<String>> {
        self.get(book_id).and_then(|s| s.non_chapters)
    }
}
