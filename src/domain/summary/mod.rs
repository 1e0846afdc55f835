//! Summary Context - 摘要限界上下文
//!
//! 职责:
//! - 摘要深度值对象
//! - 摘要树节点与扁平 arena 存储
//! - 规范化后的摘要响应

mod depth;
mod section;
mod tree;

use thiserror::Error;

pub use depth::Depth;
pub use section::{RenderedSection, SectionStub, SummaryResponse, SummarySection, ROOT_SECTION_ID};
pub use tree::SummaryTree;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Invalid depth: {0}")]
    InvalidDepth(u8),

    #[error("Depth ceiling reached at {0}")]
    DepthCeiling(u8),

    #[error("Section not found: {0}")]
    SectionNotFound(String),
}
