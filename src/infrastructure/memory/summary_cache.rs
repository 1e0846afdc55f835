//! In-Memory Summary Cache Implementation

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{cache_key, CacheEntry, SummaryCachePort, DEFAULT_CACHE_TTL_MS};
use crate::domain::summary::{Depth, SectionStub};

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryCacheStats {
    pub total_entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub expired_count: u64,
}

/// 内存摘要缓存
///
/// 整个应用会话共享一个实例，跨书籍按 key 区分
pub struct InMemorySummaryCache {
    entries: DashMap<String, CacheEntry>,
    ttl_ms: i64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    expired_count: AtomicU64,
}

impl InMemorySummaryCache {
    pub fn new() -> Self {
        Self::with_ttl_ms(DEFAULT_CACHE_TTL_MS)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_ttl_ms(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
    }

    fn with_ttl_ms(ttl_ms: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// 以指定时间点判断新鲜度的读取
    pub fn get_entry_at(
        &self,
        book_id: &str,
        section_id: Option<&str>,
        depth: Depth,
        now_ms: i64,
    ) -> Option<CacheEntry> {
        let key = cache_key(book_id, section_id, depth);

        let expired = self
            .entries
            .remove_if(&key, |_, entry| now_ms - entry.timestamp > self.ttl_ms)
            .is_some();
        if expired {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Summary cache entry expired");
            return None;
        }

        match self.entries.get(&key) {
            Some(entry) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "Summary cache hit");
                Some(entry.clone())
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "Summary cache miss");
                None
            }
        }
    }

    /// 以指定时间点写入
    pub fn set_at(
        &self,
        book_id: &str,
        section_id: Option<&str>,
        depth: Depth,
        content: String,
        children: Vec<SectionStub>,
        now_ms: i64,
    ) {
        let key = cache_key(book_id, section_id, depth);
        tracing::debug!(key = %key, content_len = content.len(), children = children.len(), "Summary cached");
        self.entries.insert(
            key,
            CacheEntry {
                content,
                timestamp: now_ms,
                depth,
                children,
            },
        );
    }

    pub fn stats(&self) -> SummaryCacheStats {
        SummaryCacheStats {
            total_entries: self.entries.len(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            expired_count: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for InMemorySummaryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryCachePort for InMemorySummaryCache {
    fn get_entry(&self, book_id: &str, section_id: Option<&str>, depth: Depth) -> Option<CacheEntry> {
        self.get_entry_at(book_id, section_id, depth, Utc::now().timestamp_millis())
    }

    fn set_with_children(
        &self,
        book_id: &str,
        section_id: Option<&str>,
        depth: Depth,
        content: String,
        children: Vec<SectionStub>,
    ) {
        self.set_at(book_id, section_id, depth, content, children, Utc::now().timestamp_millis());
    }

    fn remove(&self, book_id: &str, section_id: Option<&str>, depth: Depth) -> bool {
        self.entries.remove(&cache_key(book_id, section_id, depth)).is_some()
    }

    fn clear(&self) {
        let count = self.entries.len();
        self.entries.clear();
        tracing::info!(count = count, "Summary cache cleared");
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
