//! Summary Cache Port - 摘要缓存
//!
//! 定义摘要缓存的抽象接口，具体实现在 infrastructure/memory 层

use crate::domain::summary::{Depth, SectionStub, ROOT_SECTION_ID};

/// 默认过期时间 24 小时（毫秒）
pub const DEFAULT_CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content: String,
    /// 写入时间（epoch 毫秒）
    pub timestamp: i64,
    pub depth: Depth,
    /// 同一响应带回的子节点占位
    pub children: Vec<SectionStub>,
}

/// Summary Cache Port
///
/// 以 (book_id, section_id, depth) 为 key 的进程内缓存
/// - 过期条目在读取时惰性删除
/// - 不按大小淘汰
/// - 同 key 后写覆盖
pub trait SummaryCachePort: Send + Sync {
    /// 读取完整条目，过期则删除并返回 None
    fn get_entry(&self, book_id: &str, section_id: Option<&str>, depth: Depth) -> Option<CacheEntry>;

    /// 写入内容与子节点占位
    fn set_with_children(
        &self,
        book_id: &str,
        section_id: Option<&str>,
        depth: Depth,
        content: String,
        children: Vec<SectionStub>,
    );

    /// 删除单个条目，返回是否存在
    fn remove(&self, book_id: &str, section_id: Option<&str>, depth: Depth) -> bool;

    /// 清空缓存
    fn clear(&self);

    /// 当前条目数（含尚未惰性删除的过期条目）
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 读取摘要文本
    fn get(&self, book_id: &str, section_id: Option<&str>, depth: Depth) -> Option<String> {
        self.get_entry(book_id, section_id, depth).map(|e| e.content)
    }

    /// 写入摘要文本
    fn set(&self, book_id: &str, section_id: Option<&str>, depth: Depth, content: String) {
        self.set_with_children(book_id, section_id, depth, content, Vec::new());
    }

    /// 删除某个 section 在所有深度上的条目，返回删除数量
    fn remove_section(&self, book_id: &str, section_id: Option<&str>) -> usize {
        (Depth::MIN_DETAIL.value()..=Depth::MAX.value())
            .filter_map(|d| Depth::new(d).ok())
            .filter(|d| self.remove(book_id, section_id, *d))
            .count()
    }
}

/// 生成缓存 key
///
/// 格式: `{book_id}:{section_id 或 "root"}:{depth}`
pub fn cache_key(book_id: &str, section_id: Option<&str>, depth: Depth) -> String {
    format!("{}:{}:{}", book_id, section_id.unwrap_or(ROOT_SECTION_ID), depth)
}
