use crate::core::{field_type::FieldType, source_type::SourceType};
use serde::{Deserialize, Serialize};

/// Pairs a source column with a destination field name and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub destination_field: String,
    pub destination_type: FieldType,

    /// Declared source column type. Validation needs it; execution does not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,

    /// Id of a transformation rule applied to this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_id: Option<String>,
}

impl FieldMapping {
    pub fn new(
        source_field: impl Into<String>,
        destination_field: impl Into<String>,
        destination_type: FieldType,
    ) -> Self {
        FieldMapping {
            source_field: source_field.into(),
            destination_field: destination_field.into(),
            destination_type,
            source_type: None,
            transform_id: None,
        }
    }

    pub fn with_source_type(mut self, source_type: impl Into<SourceType>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    pub fn with_transform(mut self, transform_id: impl Into<String>) -> Self {
        self.transform_id = Some(transform_id.into());
        self
    }
}
