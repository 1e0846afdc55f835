//! Summary Tree View-Model
//!
//! 单本书的摘要树状态，协调缓存与后端请求：
//! - 展开时先查缓存，未命中再请求 depth + 1
//! - 折叠不丢弃内容，再次展开不发请求
//! - depth 达到上限的节点永远不请求
//! - 节点加载中时重复展开是 no-op
//! - 加载中被折叠的节点，请求返回后保持折叠

use std::sync::{Arc, RwLock};

use crate::application::error::ApplicationError;
use crate::application::ports::{ApiError, BookApiPort, SummaryCachePort};
use crate::domain::summary::{
    Depth, RenderedSection, SectionStub, SummarySection, SummaryTree, ROOT_SECTION_ID,
};
use crate::infrastructure::events::EventPublisher;

/// 摘要内容的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// 节点自身保留的内容（折叠后再展开）
    Retained,
    Cache,
    Network,
}

/// expand 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// 节点原本已展开，本次调用将其折叠
    Collapsed,
    Expanded(ContentSource),
    /// 已达到最大深度，未做任何事
    AtMaxDepth,
    /// 节点正在加载，未做任何事
    AlreadyLoading,
}

/// 在节点锁内做出的决定
enum Step {
    Collapsed,
    Busy,
    Ceiling,
    Retained,
    Load(Depth),
}

pub struct SummaryTreeViewModel {
    book_id: String,
    tree: SummaryTree,
    cache: Arc<dyn SummaryCachePort>,
    api: Arc<dyn BookApiPort>,
    events: Option<Arc<EventPublisher>>,
    max_depth: Depth,
    error: RwLock<Option<String>>,
}

impl SummaryTreeViewModel {
    pub fn new(
        book_id: impl Into<String>,
        root_title: impl Into<String>,
        cache: Arc<dyn SummaryCachePort>,
        api: Arc<dyn BookApiPort>,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            tree: SummaryTree::new(root_title),
            cache,
            api,
            events: None,
            max_depth: Depth::MAX,
            error: RwLock::new(None),
        }
    }

    pub fn with_events(mut self, events: Arc<EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// 最大深度，超出 [1, 4] 的值会被截断
    pub fn with_max_depth(mut self, max_depth: u8) -> Self {
        self.max_depth = Depth::clamped(max_depth);
        self
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn max_depth(&self) -> Depth {
        self.max_depth
    }

    pub fn section(&self, id: &str) -> Option<SummarySection> {
        self.tree.get(id)
    }

    /// 最近一次失败的错误信息
    pub fn error(&self) -> Option<String> {
        self.error.read().ok().and_then(|e| e.clone())
    }

    /// 按渲染顺序输出当前可见的节点
    pub fn snapshot(&self) -> Vec<RenderedSection> {
        self.tree.flatten()
    }

    /// 加载书籍根摘要与章节列表，根节点已展开时不做任何事
    pub async fn load_root(&self) -> Result<ExpandOutcome, ApplicationError> {
        if self.tree.get(ROOT_SECTION_ID).is_some_and(|r| r.is_expanded) {
            return Ok(ExpandOutcome::Expanded(ContentSource::Retained));
        }
        self.expand(ROOT_SECTION_ID).await
    }

    /// 切换节点的展开状态
    pub async fn expand(&self, id: &str) -> Result<ExpandOutcome, ApplicationError> {
        let max_depth = self.max_depth;
        let step = self.tree.update(id, |node| {
            if node.is_expanded {
                node.is_expanded = false;
                return Step::Collapsed;
            }
            if node.is_loading {
                return Step::Busy;
            }
            let Some(target) = node.depth.next_within(max_depth) else {
                return Step::Ceiling;
            };
            if node.content_depth == Some(target) && node.has_content() {
                node.is_expanded = true;
                return Step::Retained;
            }
            node.is_loading = true;
            Step::Load(target)
        })?;

        match step {
            Step::Collapsed => {
                tracing::debug!(book_id = %self.book_id, section_id = %id, "Section collapsed");
                Ok(ExpandOutcome::Collapsed)
            }
            Step::Busy => Ok(ExpandOutcome::AlreadyLoading),
            Step::Ceiling => {
                tracing::debug!(book_id = %self.book_id, section_id = %id, "Max depth reached");
                Ok(ExpandOutcome::AtMaxDepth)
            }
            Step::Retained => {
                self.publish_expanded(id, true);
                Ok(ExpandOutcome::Expanded(ContentSource::Retained))
            }
            Step::Load(target) => {
                let source = self.load(id, target, true).await?;
                Ok(ExpandOutcome::Expanded(source))
            }
        }
    }

    /// 折叠节点，返回节点之前是否展开
    pub fn collapse(&self, id: &str) -> Result<bool, ApplicationError> {
        Ok(self.tree.update(id, |node| {
            if node.is_loading {
                node.collapse_requested = true;
            }
            std::mem::replace(&mut node.is_expanded, false)
        })?)
    }

    /// 把节点内容降低一级细节，最低到 depth 1；返回新的内容深度
    ///
    /// 只替换内容，不改变子节点
    pub async fn decrease_depth(&self, id: &str) -> Result<Option<Depth>, ApplicationError> {
        let target = self.tree.update(id, |node| {
            if node.is_loading {
                return None;
            }
            let target = node.content_depth.and_then(|d| d.prev())?;
            node.is_loading = true;
            Some(target)
        })?;

        match target {
            Some(target) => {
                self.load(id, target, false).await?;
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }

    /// 丢弃节点及其子孙的本地内容与缓存，下一次展开会重新请求
    ///
    /// 返回删除的缓存条目数
    pub fn invalidate_section(&self, id: &str) -> Result<usize, ApplicationError> {
        if !self.tree.contains(id) {
            return Err(ApplicationError::not_found("Section", id));
        }

        let mut removed = 0;
        let mut ids = vec![id.to_string()];
        ids.extend(self.tree.descendants(id));
        for section_id in &ids {
            removed += self.cache.remove_section(&self.book_id, section_arg(section_id));
            // 加载中的节点由其请求负责收尾
            let _ = self.tree.update(section_id, |node| {
                node.is_expanded = false;
                if node.is_loading {
                    node.collapse_requested = true;
                } else {
                    node.content.clear();
                    node.content_depth = None;
                }
            });
        }

        tracing::info!(
            book_id = %self.book_id,
            section_id = %id,
            sections = ids.len(),
            cache_entries = removed,
            "Section invalidated"
        );
        Ok(removed)
    }

    /// 先查缓存再请求，节点必须已被标记为 loading
    async fn load(&self, id: &str, target: Depth, expand: bool) -> Result<ContentSource, ApplicationError> {
        let section = section_arg(id);

        if let Some(entry) = self.cache.get_entry(&self.book_id, section, target) {
            self.commit(id, target, entry.content, &entry.children, expand)?;
            tracing::debug!(book_id = %self.book_id, section_id = %id, depth = %target, "Summary cache hit");
            self.publish_expanded(id, true);
            return Ok(ContentSource::Cache);
        }

        match self.api.fetch_summary(&self.book_id, target, section).await {
            Ok(summary) => {
                self.cache.set_with_children(
                    &self.book_id,
                    section,
                    target,
                    summary.content.clone(),
                    summary.children.clone(),
                );
                self.commit(id, target, summary.content, &summary.children, expand)?;
                tracing::info!(
                    book_id = %self.book_id,
                    section_id = %id,
                    depth = %target,
                    children = summary.children.len(),
                    "Summary loaded"
                );
                self.publish_expanded(id, false);
                Ok(ContentSource::Network)
            }
            Err(e) => {
                self.fail(id, &e);
                Err(e.into())
            }
        }
    }

    /// 写入内容与子节点并清除 loading
    fn commit(
        &self,
        id: &str,
        target: Depth,
        content: String,
        children: &[SectionStub],
        expand: bool,
    ) -> Result<(), ApplicationError> {
        // 只有内容的缓存条目不覆盖已有子节点
        if expand && !children.is_empty() {
            if let Err(e) = self.tree.attach_children(id, children) {
                let _ = self.tree.update(id, |node| {
                    node.is_loading = false;
                    node.collapse_requested = false;
                });
                return Err(e.into());
            }
        }
        self.tree.update(id, |node| {
            node.content = content;
            node.content_depth = Some(target);
            node.is_loading = false;
            if expand && !node.collapse_requested {
                node.is_expanded = true;
            }
            node.collapse_requested = false;
        })?;
        self.set_error(None);
        Ok(())
    }

    fn fail(&self, id: &str, error: &ApiError) {
        let _ = self.tree.update(id, |node| {
            node.is_loading = false;
            node.collapse_requested = false;
        });
        tracing::warn!(book_id = %self.book_id, section_id = %id, error = %error, "Failed to load summary");
        self.set_error(Some(error.to_string()));
        if let Some(events) = &self.events {
            events.publish_section_failed(&self.book_id, id, &error.to_string());
        }
    }

    fn set_error(&self, error: Option<String>) {
        if let Ok(mut slot) = self.error.write() {
            *slot = error;
        }
    }

    fn publish_expanded(&self, id: &str, from_cache: bool) {
        if let Some(events) = &self.events {
            events.publish_section_expanded(&self.book_id, id, from_cache);
        }
    }
}

/// 根节点请求时不带 section
fn section_arg(id: &str) -> Option<&str> {
    if id == ROOT_SECTION_ID {
        None
    } else {
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{cache_key, ApiOperation};
    use crate::domain::summary::SummaryResponse;
    use crate::infrastructure::adapters::FakeBookApi;
    use crate::infrastructure::events::ClientEvent;
    use crate::infrastructure::memory::InMemorySummaryCache;
    use std::time::Duration;

    fn depth(value: u8) -> Depth {
        Depth::new(value).unwrap()
    }

    fn stubs(ids: &[&str]) -> Vec<SectionStub> {
        ids.iter().map(|id| SectionStub::new(*id, format!("Title {}", id))).collect()
    }

    struct Fixture {
        api: Arc<FakeBookApi>,
        cache: Arc<InMemorySummaryCache>,
        vm: SummaryTreeViewModel,
    }

    /// b1: root -> ch-1, ch-2；ch-1 depth 2 -> s-1, s-2
    fn fixture() -> Fixture {
        let api = Arc::new(FakeBookApi::new());
        api.set_summary("b1", None, depth(1), SummaryResponse::new("Whales.", stubs(&["ch-1", "ch-2"])));
        api.set_summary("b1", Some("ch-1"), depth(2), SummaryResponse::new("Ishmael goes to sea.", stubs(&["s-2", "s-1"])));
        api.set_summary("b1", Some("ch-1"), depth(1), SummaryResponse::new("Loomings.", vec![]));

        let cache = Arc::new(InMemorySummaryCache::new());
        let vm = SummaryTreeViewModel::new("b1", "Moby Dick", cache.clone(), api.clone());
        Fixture { api, cache, vm }
    }

    #[tokio::test]
    async fn test_load_root_populates_chapters() {
        let fx = fixture();
        let outcome = fx.vm.load_root().await.unwrap();
        assert_eq!(outcome, ExpandOutcome::Expanded(ContentSource::Network));

        let rows = fx.vm.snapshot();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "ch-1", "ch-2"]);
        assert_eq!(rows[0].content, "Whales.");
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[1].level, 1);
        assert!(rows[1].content.is_empty());
        assert_eq!(fx.api.calls(), vec!["GET /api/summary/b1?depth=1".to_string()]);

        // 再次调用不会重新请求
        fx.vm.load_root().await.unwrap();
        assert_eq!(fx.api.call_count("GET /api/summary"), 1);
    }

    #[tokio::test]
    async fn test_expand_chapter_fetches_next_depth_once() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.api.reset_calls();

        let outcome = fx.vm.expand("ch-1").await.unwrap();
        assert_eq!(outcome, ExpandOutcome::Expanded(ContentSource::Network));
        assert_eq!(fx.api.calls(), vec!["GET /api/summary/b1?depth=2&section=ch-1".to_string()]);

        let entry = fx.cache.get_entry("b1", Some("ch-1"), depth(2)).unwrap();
        assert_eq!(entry.content, "Ishmael goes to sea.");

        let ch1 = fx.vm.section("ch-1").unwrap();
        assert_eq!(ch1.content, "Ishmael goes to sea.");
        assert_eq!(ch1.children, vec!["s-2".to_string(), "s-1".to_string()]);

        let child = fx.vm.section("s-2").unwrap();
        assert_eq!(child.depth, depth(2));
        assert!(child.content.is_empty());
        assert!(!child.is_expanded);
    }

    #[tokio::test]
    async fn test_collapse_then_expand_is_free() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.vm.expand("ch-1").await.unwrap();
        let before = fx.vm.section("ch-1").unwrap().content;
        fx.api.reset_calls();

        assert_eq!(fx.vm.expand("ch-1").await.unwrap(), ExpandOutcome::Collapsed);
        assert!(fx.vm.section("ch-1").unwrap().has_content());
        let rows: Vec<String> = fx.vm.snapshot().into_iter().map(|r| r.id).collect();
        assert!(!rows.contains(&"s-1".to_string()));

        assert_eq!(
            fx.vm.expand("ch-1").await.unwrap(),
            ExpandOutcome::Expanded(ContentSource::Retained)
        );
        assert_eq!(fx.vm.section("ch-1").unwrap().content, before);
        assert!(fx.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_in_new_session() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.vm.expand("ch-1").await.unwrap();

        // 同一缓存，新的树
        let vm = SummaryTreeViewModel::new("b1", "Moby Dick", fx.cache.clone(), fx.api.clone());
        fx.api.reset_calls();
        assert_eq!(
            vm.load_root().await.unwrap(),
            ExpandOutcome::Expanded(ContentSource::Cache)
        );
        assert_eq!(
            vm.expand("ch-1").await.unwrap(),
            ExpandOutcome::Expanded(ContentSource::Cache)
        );
        assert!(fx.api.calls().is_empty());
        assert_eq!(vm.section("ch-1").unwrap().children.len(), 2);
    }

    #[tokio::test]
    async fn test_no_fetch_at_max_depth() {
        let api = Arc::new(FakeBookApi::new());
        let cache = Arc::new(InMemorySummaryCache::new());
        let chain = ["d1", "d2", "d3", "d4"];
        api.set_summary("b1", None, depth(1), SummaryResponse::new("root", stubs(&chain[..1])));
        for (i, id) in chain.iter().enumerate().take(3) {
            let d = depth(i as u8 + 2);
            api.set_summary("b1", Some(id), d, SummaryResponse::new(format!("text {}", d), stubs(&chain[i + 1..i + 2])));
        }

        let vm = SummaryTreeViewModel::new("b1", "Deep", cache, api.clone());
        vm.load_root().await.unwrap();
        for id in &chain[..3] {
            vm.expand(id).await.unwrap();
        }
        assert_eq!(vm.section("d4").unwrap().depth, Depth::MAX);

        api.reset_calls();
        assert_eq!(vm.expand("d4").await.unwrap(), ExpandOutcome::AtMaxDepth);
        assert_eq!(vm.expand("d4").await.unwrap(), ExpandOutcome::AtMaxDepth);
        assert!(api.calls().is_empty());
        assert!(!vm.section("d4").unwrap().is_expanded);
    }

    #[tokio::test]
    async fn test_configured_max_depth_lowers_ceiling() {
        let fx = fixture();
        let vm = SummaryTreeViewModel::new("b1", "Moby Dick", fx.cache.clone(), fx.api.clone()).with_max_depth(1);
        vm.load_root().await.unwrap();
        fx.api.reset_calls();

        assert_eq!(vm.expand("ch-1").await.unwrap(), ExpandOutcome::AtMaxDepth);
        assert!(fx.api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_expand_while_loading_is_noop() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.api.reset_calls();
        fx.api.set_summary_delay(Duration::from_millis(500));

        let (first, second) = tokio::join!(fx.vm.expand("ch-1"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let loading = fx.vm.section("ch-1").unwrap().is_loading;
            (loading, fx.vm.expand("ch-1").await)
        });

        assert_eq!(first.unwrap(), ExpandOutcome::Expanded(ContentSource::Network));
        let (was_loading, second) = second;
        assert!(was_loading);
        assert_eq!(second.unwrap(), ExpandOutcome::AlreadyLoading);
        assert_eq!(fx.api.call_count("GET /api/summary"), 1);
        assert!(!fx.vm.section("ch-1").unwrap().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collapse_while_loading_keeps_node_collapsed() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.api.set_summary_delay(Duration::from_millis(500));

        let (first, collapsed) = tokio::join!(fx.vm.expand("ch-1"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            fx.vm.collapse("ch-1")
        });
        assert_eq!(first.unwrap(), ExpandOutcome::Expanded(ContentSource::Network));
        assert!(!collapsed.unwrap());

        // 内容与子节点已写入，但节点保持折叠
        let ch1 = fx.vm.section("ch-1").unwrap();
        assert!(!ch1.is_expanded);
        assert!(!ch1.is_loading);
        assert_eq!(ch1.content, "Ishmael goes to sea.");
        assert_eq!(ch1.children.len(), 2);
        let ids: Vec<String> = fx.vm.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["root", "ch-1", "ch-2"]);

        // 再次展开使用保留的内容
        fx.api.reset_calls();
        assert_eq!(
            fx.vm.expand("ch-1").await.unwrap(),
            ExpandOutcome::Expanded(ContentSource::Retained)
        );
        assert!(fx.api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_while_loading_keeps_node_collapsed() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.api.set_summary_delay(Duration::from_millis(500));

        let (first, _) = tokio::join!(fx.vm.expand("ch-1"), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            fx.vm.invalidate_section("ch-1").unwrap()
        });
        first.unwrap();
        assert!(!fx.vm.section("ch-1").unwrap().is_expanded);
        assert!(!fx.vm.section("ch-1").unwrap().collapse_requested);
    }

    #[tokio::test]
    async fn test_failure_leaves_node_collapsed() {
        let fx = fixture();
        let events = Arc::new(EventPublisher::new());
        let vm = SummaryTreeViewModel::new("b1", "Moby Dick", fx.cache.clone(), fx.api.clone())
            .with_events(events.clone());
        let mut rx = events.subscribe_book("b1");
        vm.load_root().await.unwrap();

        fx.api.fail_next(
            ApiOperation::FetchSummary,
            ApiError::status_error(ApiOperation::FetchSummary, 500, "summarizer offline"),
        );
        let err = vm.expand("ch-1").await.unwrap_err();
        assert!(err.is_external());
        assert_eq!(err.to_string(), "Failed to fetch summary: summarizer offline");

        let ch1 = vm.section("ch-1").unwrap();
        assert!(!ch1.is_expanded);
        assert!(!ch1.is_loading);
        assert!(!ch1.has_content());
        assert!(vm.error().unwrap().contains("summarizer offline"));
        assert!(fx.cache.get_entry("b1", Some("ch-1"), depth(2)).is_none());

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            saw_failure |= matches!(event, ClientEvent::SectionFailed { ref section_id, .. } if section_id == "ch-1");
        }
        assert!(saw_failure);

        // 用户重试
        assert_eq!(
            vm.expand("ch-1").await.unwrap(),
            ExpandOutcome::Expanded(ContentSource::Network)
        );
        assert!(vm.error().is_none());
    }

    #[tokio::test]
    async fn test_expand_unknown_section() {
        let fx = fixture();
        let err = fx.vm.expand("missing").await.unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_decrease_depth_replaces_content_only() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.vm.expand("ch-1").await.unwrap();
        fx.api.reset_calls();

        assert_eq!(fx.vm.decrease_depth("ch-1").await.unwrap(), Some(depth(1)));
        assert_eq!(fx.api.calls(), vec!["GET /api/summary/b1?depth=1&section=ch-1".to_string()]);

        let ch1 = fx.vm.section("ch-1").unwrap();
        assert_eq!(ch1.content, "Loomings.");
        assert_eq!(ch1.content_depth, Some(depth(1)));
        assert_eq!(ch1.children.len(), 2);
        assert!(ch1.is_expanded);

        // 已经是最低深度
        assert_eq!(fx.vm.decrease_depth("ch-1").await.unwrap(), None);
        assert_eq!(fx.api.call_count("GET /api/summary"), 1);
    }

    #[tokio::test]
    async fn test_invalidate_section_forces_refetch() {
        let fx = fixture();
        fx.vm.load_root().await.unwrap();
        fx.vm.expand("ch-1").await.unwrap();
        assert!(fx.cache.get_entry("b1", Some("ch-1"), depth(2)).is_some());

        let removed = fx.vm.invalidate_section("ch-1").unwrap();
        assert_eq!(removed, 1);
        assert!(fx.cache.get_entry("b1", Some("ch-1"), depth(2)).is_none());
        let ch1 = fx.vm.section("ch-1").unwrap();
        assert!(!ch1.is_expanded);
        assert!(!ch1.has_content());

        fx.api.reset_calls();
        fx.vm.expand("ch-1").await.unwrap();
        assert_eq!(fx.api.call_count("GET /api/summary/b1?depth=2&section=ch-1"), 1);
        assert_eq!(cache_key("b1", Some("ch-1"), depth(2)), "b1:ch-1:2");
    }
}
