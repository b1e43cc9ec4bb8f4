use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Last value seen for the incremental watermark column, optionally paired
/// with the tiebreaker key of the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
}

impl Watermark {
    pub fn new(value: Value) -> Self {
        Watermark { value, key: None }
    }

    pub fn with_key(value: Value, key: Value) -> Self {
        Watermark {
            value,
            key: Some(key),
        }
    }

    /// Orders by value first and by key on ties. Incomparable values order
    /// as equal so a malformed row never moves the watermark backwards.
    pub fn compare(&self, other: &Watermark) -> Ordering {
        let by_value = self.value.compare(&other.value).unwrap_or(Ordering::Equal);
        if by_value != Ordering::Equal {
            return by_value;
        }
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }

    /// Returns the greater of two optional watermarks.
    pub fn max(a: Option<Watermark>, b: Option<Watermark>) -> Option<Watermark> {
        match (a, b) {
            (Some(a), Some(b)) => {
                if b.compare(&a) == Ordering::Greater {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// The incremental predicate applied to a job's base query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkBound {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiebreaker: Option<String>,
    /// `None` on the first incremental run: every row qualifies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Watermark>,
}

impl WatermarkBound {
    pub fn new(column: impl Into<String>) -> Self {
        WatermarkBound {
            column: column.into(),
            tiebreaker: None,
            last: None,
        }
    }

    pub fn with_tiebreaker(mut self, tiebreaker: Option<String>) -> Self {
        self.tiebreaker = tiebreaker;
        self
    }

    pub fn after(mut self, last: Option<Watermark>) -> Self {
        self.last = last;
        self
    }
}
