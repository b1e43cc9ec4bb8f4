use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, str::FromStr};

/// Destination (search index) field type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum FieldType {
    Long,
    Integer,
    Short,
    Byte,
    Double,
    Float,
    HalfFloat,
    ScaledFloat,
    Boolean,
    Keyword,
    Text,
    Date,
    Binary,
    Object,
    Other(String),
}

/// Coarse grouping used for compatibility checks and value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Integer,
    Floating,
    String,
    Date,
    Boolean,
    Binary,
    Object,
    Unknown,
}

impl FieldType {
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            FieldType::Long => Cow::Borrowed("long"),
            FieldType::Integer => Cow::Borrowed("integer"),
            FieldType::Short => Cow::Borrowed("short"),
            FieldType::Byte => Cow::Borrowed("byte"),
            FieldType::Double => Cow::Borrowed("double"),
            FieldType::Float => Cow::Borrowed("float"),
            FieldType::HalfFloat => Cow::Borrowed("half_float"),
            FieldType::ScaledFloat => Cow::Borrowed("scaled_float"),
            FieldType::Boolean => Cow::Borrowed("boolean"),
            FieldType::Keyword => Cow::Borrowed("keyword"),
            FieldType::Text => Cow::Borrowed("text"),
            FieldType::Date => Cow::Borrowed("date"),
            FieldType::Binary => Cow::Borrowed("binary"),
            FieldType::Object => Cow::Borrowed("object"),
            FieldType::Other(name) => Cow::Borrowed(name),
        }
    }

    pub fn family(&self) -> TypeFamily {
        match self {
            FieldType::Long | FieldType::Integer | FieldType::Short | FieldType::Byte => {
                TypeFamily::Integer
            }
            FieldType::Double | FieldType::Float | FieldType::HalfFloat | FieldType::ScaledFloat => {
                TypeFamily::Floating
            }
            FieldType::Keyword | FieldType::Text => TypeFamily::String,
            FieldType::Date => TypeFamily::Date,
            FieldType::Boolean => TypeFamily::Boolean,
            FieldType::Binary => TypeFamily::Binary,
            FieldType::Object => TypeFamily::Object,
            FieldType::Other(_) => TypeFamily::Unknown,
        }
    }

    /// Approximate width in bits for numeric types, used to detect narrowing.
    pub fn numeric_width(&self) -> Option<u8> {
        match self {
            FieldType::Long | FieldType::Double => Some(64),
            FieldType::Integer | FieldType::Float => Some(32),
            FieldType::Short | FieldType::HalfFloat => Some(16),
            FieldType::Byte => Some(8),
            FieldType::ScaledFloat => Some(64),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FieldType::Other(_))
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "long" => FieldType::Long,
            "integer" => FieldType::Integer,
            "short" => FieldType::Short,
            "byte" => FieldType::Byte,
            "double" => FieldType::Double,
            "float" => FieldType::Float,
            "half_float" => FieldType::HalfFloat,
            "scaled_float" => FieldType::ScaledFloat,
            "boolean" => FieldType::Boolean,
            "keyword" => FieldType::Keyword,
            "text" => FieldType::Text,
            "date" => FieldType::Date,
            "binary" => FieldType::Binary,
            "object" => FieldType::Object,
            _ => FieldType::Other(s.trim().to_string()),
        })
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.name().into_owned()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
