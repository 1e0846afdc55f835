//! Summary Context - Depth 值对象

use serde::{Deserialize, Serialize};

use super::SummaryError;

/// 摘要深度
///
/// 0 = 整本书（根节点），1..=4 为逐级细化的章节/小节摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Depth(u8);

impl Depth {
    pub const ROOT: Depth = Depth(0);
    /// 展开操作的最小深度
    pub const MIN_DETAIL: Depth = Depth(1);
    /// 允许请求的最大深度
    pub const MAX: Depth = Depth(4);

    pub fn new(value: u8) -> Result<Self, SummaryError> {
        if value > Self::MAX.0 {
            return Err(SummaryError::InvalidDepth(value));
        }
        Ok(Self(value))
    }

    /// 截断到 [1, 4]
    pub fn clamped(value: u8) -> Self {
        Self(value.clamp(Self::MIN_DETAIL.0, Self::MAX.0))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// 下一级深度；超过 ceiling（不高于 MAX）时返回 None
    pub fn next_within(self, ceiling: Depth) -> Option<Depth> {
        let ceiling = ceiling.min(Self::MAX);
        if self >= ceiling {
            None
        } else {
            Some(Self(self.0 + 1))
        }
    }

    pub fn next(self) -> Option<Depth> {
        self.next_within(Self::MAX)
    }

    /// 上一级深度，下限为 1
    pub fn prev(self) -> Option<Depth> {
        if self <= Self::MIN_DETAIL {
            None
        } else {
            Some(Self(self.0 - 1))
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Depth {
    type Error = SummaryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_bounds() {
        assert!(Depth::new(4).is_ok());
        assert!(matches!(Depth::new(5), Err(SummaryError::InvalidDepth(5))));
        assert_eq!(Depth::clamped(0), Depth::MIN_DETAIL);
        assert_eq!(Depth::clamped(9), Depth::MAX);
    }

    #[test]
    fn test_next_stops_at_ceiling() {
        assert_eq!(Depth::ROOT.next(), Some(Depth::MIN_DETAIL));
        assert_eq!(Depth::new(3).unwrap().next(), Some(Depth::MAX));
        assert_eq!(Depth::MAX.next(), None);

        let ceiling = Depth::new(2).unwrap();
        assert_eq!(Depth::new(2).unwrap().next_within(ceiling), None);
        // ceiling 不能超过 MAX
        assert_eq!(Depth::MAX.next_within(Depth(7)), None);
    }

    #[test]
    fn test_prev_floor() {
        assert_eq!(Depth::new(2).unwrap().prev(), Some(Depth::MIN_DETAIL));
        assert_eq!(Depth::MIN_DETAIL.prev(), None);
        assert_eq!(Depth::ROOT.prev(), None);
    }
}
