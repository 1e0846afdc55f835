//! In-Memory Status Store Implementation

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{StatusSnapshot, StatusStorePort};
use crate::domain::book::BookStatus;

/// 内存状态快照存储
pub struct InMemoryStatusStore {
    snapshots: DashMap<String, StatusSnapshot>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStorePort for InMemoryStatusStore {
    fn put_status(&self, book_id: &str, status: BookStatus) {
        let mut snapshot = self.snapshots.entry(book_id.to_string()).or_default();
        tracing::debug!(
            book_id = %book_id,
            completed = status.completed_chapters,
            total = status.total_chapters,
            "Book status stored"
        );
        snapshot.status = Some(status);
        snapshot.error = None;
        snapshot.stale = false;
        snapshot.updated_at = Some(Utc::now());
    }

    fn record_error(&self, book_id: &str, error: String) {
        let mut snapshot = self.snapshots.entry(book_id.to_string()).or_default();
        snapshot.error = Some(error);
        snapshot.updated_at = Some(Utc::now());
    }

    fn put_non_chapters(&self, book_id: &str, ids: Vec<String>) {
        let mut snapshot = self.snapshots.entry(book_id.to_string()).or_default();
        snapshot.non_chapters = Some(ids);
    }

    fn get(&self, book_id: &str) -> Option<StatusSnapshot> {
        self.snapshots.get(book_id).map(|s| s.clone())
    }

    fn invalidate(&self, book_id: &str) -> bool {
        match self.snapshots.get_mut(book_id) {
            Some(mut snapshot) => {
                snapshot.stale = true;
                tracing::debug!(book_id = %book_id, "Book status invalidated");
                true
            }
            None => false,
        }
    }

    fn remove(&self, book_id: &str) {
        self.snapshots.remove(book_id);
    }
}
