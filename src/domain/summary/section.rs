//! Summary Context - Entities

use serde::{Deserialize, Serialize};

use super::Depth;

/// 根节点 ID（缓存 key 中同样使用 "root"）
pub const ROOT_SECTION_ID: &str = "root";

/// 子节点占位：只有 id 和标题，内容按需加载
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionStub {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

impl SectionStub {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// 规范化后的摘要响应
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SummaryResponse {
    pub content: String,
    /// 下一层子节点，保持后端返回顺序
    pub children: Vec<SectionStub>,
}

impl SummaryResponse {
    pub fn new(content: impl Into<String>, children: Vec<SectionStub>) -> Self {
        Self {
            content: content.into(),
            children,
        }
    }
}

/// 摘要树节点
///
/// 不变量:
/// - 子节点 depth = 父节点 depth + 1
/// - content 为空表示该深度尚未加载
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySection {
    pub id: String,
    pub title: String,
    pub content: String,
    pub depth: Depth,
    /// 当前 content 对应的摘要深度
    pub content_depth: Option<Depth>,
    pub parent: Option<String>,
    /// 子节点 ID，后端顺序
    pub children: Vec<String>,
    pub is_expanded: bool,
    pub is_loading: bool,
    /// 加载中被折叠：请求返回后只写入内容，不展开
    pub collapse_requested: bool,
}

impl SummarySection {
    pub fn root(title: impl Into<String>) -> Self {
        Self {
            id: ROOT_SECTION_ID.to_string(),
            title: title.into(),
            content: String::new(),
            depth: Depth::ROOT,
            content_depth: None,
            parent: None,
            children: Vec::new(),
            is_expanded: false,
            is_loading: false,
            collapse_requested: false,
        }
    }

    pub fn stub(stub: &SectionStub, depth: Depth, parent: &str) -> Self {
        Self {
            id: stub.id.clone(),
            title: stub.title.clone(),
            content: String::new(),
            depth,
            content_depth: None,
            parent: Some(parent.to_string()),
            children: Vec::new(),
            is_expanded: false,
            is_loading: false,
            collapse_requested: false,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// 渲染用的扁平行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    pub id: String,
    pub title: String,
    pub content: String,
    pub depth: u8,
    /// 在渲染树中的缩进层级
    pub level: usize,
    pub is_expanded: bool,
    pub is_loading: bool,
    pub has_children: bool,
}
