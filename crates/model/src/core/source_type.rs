use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A source column type descriptor such as `NUMBER(10,2)` or `VARCHAR2(100)`.
///
/// The name is normalized to upper case with the parenthesised arguments
/// removed, so `timestamp(6) with time zone` becomes `TIMESTAMP WITH TIME ZONE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct SourceType {
    pub name: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
}

const NUMERIC_NAMES: &[&str] = &["NUMBER", "NUMERIC", "DECIMAL", "DEC", "FLOAT"];

impl SourceType {
    pub fn new(name: &str) -> Self {
        SourceType {
            name: normalize_name(name),
            length: None,
            precision: None,
            scale: None,
        }
    }

    pub fn with_precision(mut self, precision: Option<u32>, scale: Option<i32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    pub fn parse(raw: &str) -> Self {
        let mut args: Option<&str> = None;
        let mut bare = String::with_capacity(raw.len());
        let mut depth = 0usize;
        let mut group_start = 0usize;

        for (idx, ch) in raw.char_indices() {
            match ch {
                '(' => {
                    if depth == 0 {
                        group_start = idx + 1;
                    }
                    depth += 1;
                }
                ')' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 && args.is_none() {
                        args = Some(&raw[group_start..idx]);
                    }
                }
                _ if depth == 0 => bare.push(ch),
                _ => {}
            }
        }

        let mut ty = SourceType::new(&bare);
        if let Some(args) = args {
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            let first = parts.first().and_then(|p| p.parse::<u32>().ok());
            let second = parts.get(1).and_then(|p| p.parse::<i32>().ok());

            if parts.len() > 1 || ty.is_numeric_name() {
                ty.precision = first;
                ty.scale = second;
            } else {
                ty.length = first;
            }
        }
        ty
    }

    fn is_numeric_name(&self) -> bool {
        NUMERIC_NAMES.contains(&self.name.as_str())
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.precision, self.scale, self.length) {
            (Some(p), Some(s), _) => write!(f, "{}({p},{s})", self.name),
            (None, Some(s), _) => write!(f, "{}(*,{s})", self.name),
            (Some(p), None, _) => write!(f, "{}({p})", self.name),
            (None, None, Some(l)) => write!(f, "{}({l})", self.name),
            (None, None, None) => f.write_str(&self.name),
        }
    }
}

impl FromStr for SourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SourceType::parse(s))
    }
}

impl From<String> for SourceType {
    fn from(s: String) -> Self {
        SourceType::parse(&s)
    }
}

impl From<&str> for SourceType {
    fn from(s: &str) -> Self {
        SourceType::parse(s)
    }
}

impl From<SourceType> for String {
    fn from(t: SourceType) -> Self {
        t.to_string()
    }
}
