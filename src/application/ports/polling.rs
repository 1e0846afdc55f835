//! Polling Control Port - 状态轮询控制
//!
//! 命令处理器通过该端口在重试后恢复轮询，具体实现在 infrastructure/worker 层

use serde::{Deserialize, Serialize};

/// 轮询阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// 未启动或已停止
    Idle,
    /// 按固定间隔拉取
    Polling,
    /// 所有章节进入终态，计时器停止
    Settled,
}

impl PollPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollPhase::Idle => "idle",
            PollPhase::Polling => "polling",
            PollPhase::Settled => "settled",
        }
    }
}

/// Polling Control Port
pub trait PollingControlPort: Send + Sync {
    /// 恢复某本书的轮询，返回该书是否有活跃的轮询器
    fn resume(&self, book_id: &str) -> bool;

    /// 当前轮询阶段
    fn phase(&self, book_id: &str) -> PollPhase;
}

/// 不做任何事的实现，用于没有后台轮询的场景（如一次性 CLI 命令）
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPollingControl;

impl PollingControlPort for NoopPollingControl {
    fn resume(&self, _book_id: &str) -> bool {
        false
    }

    fn phase(&self, _book_id: &str) -> PollPhase {
        PollPhase::Idle
    }
}
