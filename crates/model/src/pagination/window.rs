use serde::{Deserialize, Serialize};
use std::fmt;

/// A bounded `(offset, limit)` slice of a source query.
///
/// `limit = None` is an open-ended window that reads until the source
/// returns no more rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Window {
    pub fn bounded(offset: u64, limit: u64) -> Self {
        Window {
            offset,
            limit: Some(limit),
        }
    }

    pub fn open(offset: u64) -> Self {
        Window {
            offset,
            limit: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.limit.is_none()
    }

    /// Exclusive upper bound of the window, if bounded.
    pub fn end(&self) -> Option<u64> {
        self.limit.map(|l| self.offset + l)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end() {
            Some(end) => write!(f, "[{}, {})", self.offset, end),
            None => write!(f, "[{}, ..)", self.offset),
        }
    }
}
