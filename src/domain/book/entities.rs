//! Book Context - Entities

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 书籍列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// 章节处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterState {
    /// 等待处理
    Pending,
    /// 正在生成摘要
    Processing,
    /// 已完成
    Complete,
    /// 处理失败
    Error,
}

impl ChapterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterState::Pending => "pending",
            ChapterState::Processing => "processing",
            ChapterState::Complete => "complete",
            ChapterState::Error => "error",
        }
    }

    /// complete 与 error 为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChapterState::Complete | ChapterState::Error)
    }
}

impl std::fmt::Display for ChapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个章节的状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterStatus {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub status: ChapterState,
    /// 仅在 status = error 时存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChapterStatus {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: ChapterState) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: ChapterState::Error,
            error: Some(error.into()),
        }
    }
}

/// 书籍整体处理状态
///
/// 不变量:
/// - completed_chapters <= total_chapters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStatus {
    #[serde(default)]
    pub total_chapters: usize,
    #[serde(default)]
    pub completed_chapters: usize,
    #[serde(default)]
    pub chapters: Vec<ChapterStatus>,
}

impl BookStatus {
    /// 由章节列表构造，计数按 complete 统计
    pub fn from_chapters(chapters: Vec<ChapterStatus>) -> Self {
        let completed_chapters = chapters
            .iter()
            .filter(|c| c.status == ChapterState::Complete)
            .count();
        Self {
            total_chapters: chapters.len(),
            completed_chapters,
            chapters,
        }
    }

    /// 是否还有 pending / processing 的章节
    pub fn has_active_chapters(&self) -> bool {
        self.chapters.iter().any(|c| !c.status.is_terminal())
    }

    /// 轮询终止条件
    pub fn should_stop_polling(&self) -> bool {
        self.total_chapters > 0
            && self.completed_chapters == self.total_chapters
            && !self.has_active_chapters()
    }

    pub fn chapter(&self, chapter_id: &str) -> Option<&ChapterStatus> {
        self.chapters.iter().find(|c| c.id == chapter_id)
    }

    /// 排除 non-chapter 后的进度 (completed, total)
    pub fn progress(&self, non_chapters: &[String]) -> (usize, usize) {
        let excluded: HashSet<&str> = non_chapters.iter().map(String::as_str).collect();
        self.chapters
            .iter()
            .filter(|c| !excluded.contains(c.id.as_str()))
            .fold((0, 0), |(completed, total), c| {
                let done = usize::from(c.status == ChapterState::Complete);
                (completed + done, total + 1)
            })
    }

    /// 本地把章节重置为 pending（重试 / 重新生成摘要后）
    pub fn mark_pending(&mut self, chapter_id: &str) -> bool {
        let Some(chapter) = self.chapters.iter_mut().find(|c| c.id == chapter_id) else {
            return false;
        };
        let was_complete = chapter.status == ChapterState::Complete;
        chapter.status = ChapterState::Pending;
        chapter.error = None;
        if was_complete {
            self.completed_chapters = self.completed_chapters.saturating_sub(1);
        }
        true
    }
}

/// 上传元数据中的章节描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterOutline {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

/// 书籍元数据
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterOutline>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
}

/// 上传响应
///
/// 旧版后端只返回 `{id, url}`，因此 book_id 同时接受 `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(alias = "id")]
    pub book_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub metadata: BookMetadata,
}
