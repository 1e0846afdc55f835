//! Summary Context - 摘要树（扁平 arena 存储）
//!
//! 节点按 id 存在 DashMap 中，父子关系通过 id 引用，避免嵌套所有权

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

use super::{RenderedSection, SectionStub, SummaryError, SummarySection, ROOT_SECTION_ID};

/// 摘要树
pub struct SummaryTree {
    nodes: DashMap<String, SummarySection>,
}

impl SummaryTree {
    pub fn new(root_title: impl Into<String>) -> Self {
        let nodes = DashMap::new();
        nodes.insert(ROOT_SECTION_ID.to_string(), SummarySection::root(root_title));
        Self { nodes }
    }

    pub fn get(&self, id: &str) -> Option<SummarySection> {
        self.nodes.get(id).map(|n| n.clone())
    }

    pub fn root(&self) -> Option<SummarySection> {
        self.get(ROOT_SECTION_ID)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 在节点的 entry 锁内修改节点
    ///
    /// 闭包内不能再访问树的其它节点
    pub fn update<F, R>(&self, id: &str, f: F) -> Result<R, SummaryError>
    where
        F: FnOnce(&mut SummarySection) -> R,
    {
        let mut node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| SummaryError::SectionNotFound(id.to_string()))?;
        Ok(f(&mut node))
    }

    /// 挂载子节点占位，返回子节点数量
    ///
    /// 已存在的子节点保留其内容和展开状态，只刷新标题；
    /// 已挂在其它父节点下的 id 会被跳过
    pub fn attach_children(&self, parent_id: &str, stubs: &[SectionStub]) -> Result<usize, SummaryError> {
        let parent_depth = self
            .nodes
            .get(parent_id)
            .map(|p| p.depth)
            .ok_or_else(|| SummaryError::SectionNotFound(parent_id.to_string()))?;
        let child_depth = parent_depth
            .next()
            .ok_or(SummaryError::DepthCeiling(parent_depth.value()))?;

        let mut child_ids = Vec::with_capacity(stubs.len());
        let mut seen = HashSet::new();
        for stub in stubs {
            if stub.id == parent_id || stub.id == ROOT_SECTION_ID || !seen.insert(stub.id.as_str()) {
                tracing::warn!(parent_id = %parent_id, child_id = %stub.id, "Skipping invalid child section");
                continue;
            }

            match self.nodes.entry(stub.id.clone()) {
                Entry::Occupied(mut existing) => {
                    if existing.get().parent.as_deref() != Some(parent_id) {
                        tracing::warn!(
                            parent_id = %parent_id,
                            child_id = %stub.id,
                            "Child section already belongs to another parent"
                        );
                        continue;
                    }
                    if !stub.title.is_empty() {
                        existing.get_mut().title = stub.title.clone();
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(SummarySection::stub(stub, child_depth, parent_id));
                }
            }
            child_ids.push(stub.id.clone());
        }

        let count = child_ids.len();
        self.update(parent_id, |parent| parent.children = child_ids)?;
        Ok(count)
    }

    /// 从 root 深度优先展开，折叠节点的子树不输出
    pub fn flatten(&self) -> Vec<RenderedSection> {
        let mut rows = Vec::new();
        let mut visited = HashSet::new();
        self.flatten_into(ROOT_SECTION_ID, 0, &mut visited, &mut rows);
        rows
    }

    fn flatten_into(
        &self,
        id: &str,
        level: usize,
        visited: &mut HashSet<String>,
        rows: &mut Vec<RenderedSection>,
    ) {
        if !visited.insert(id.to_string()) {
            return;
        }
        let Some(node) = self.get(id) else {
            return;
        };

        rows.push(RenderedSection {
            id: node.id.clone(),
            title: node.title.clone(),
            content: node.content.clone(),
            depth: node.depth.value(),
            level,
            is_expanded: node.is_expanded,
            is_loading: node.is_loading,
            has_children: !node.children.is_empty(),
        });

        if node.is_expanded {
            for child in &node.children {
                self.flatten_into(child, level + 1, visited, rows);
            }
        }
    }

    /// 当前节点下所有已加载子孙节点的 id（不含自身）
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<String> = self
            .get(id)
            .map(|n| n.children.into_iter().rev().collect())
            .unwrap_or_default();
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(node) = self.get(&next) {
                stack.extend(node.children.into_iter().rev());
            }
            out.push(next);
        }
        out
    }
}
