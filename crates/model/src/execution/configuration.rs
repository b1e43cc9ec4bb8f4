use crate::{
    core::identifiers::ConfigId,
    pagination::watermark::{Watermark, WatermarkBound},
    transform::{mapping::FieldMapping, rule::TransformationRule},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to copy, from where, and into which index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfiguration {
    pub id: ConfigId,
    pub name: String,

    /// Name of the source connection in the engine settings.
    pub source_connection: String,
    /// Name of the destination connection in the engine settings.
    pub destination_connection: String,

    pub source_query: String,
    pub destination_index: String,

    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub transformation_rules: Vec<TransformationRule>,

    /// Destination field whose value becomes the document id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id_field: Option<String>,

    /// Unique source column pages are ordered by. Defaults to the source
    /// column behind `document_id_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_tiebreaker: Option<String>,

    /// Advisory only, in minutes. Nothing in the engine schedules runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_interval: Option<u32>,

    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watermark: Option<Watermark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl MappingConfiguration {
    pub fn new(
        name: impl Into<String>,
        source_connection: impl Into<String>,
        destination_connection: impl Into<String>,
        source_query: impl Into<String>,
        destination_index: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        MappingConfiguration {
            id: ConfigId::generate(),
            name: name.into(),
            source_connection: source_connection.into(),
            destination_connection: destination_connection.into(),
            source_query: source_query.into(),
            destination_index: destination_index.into(),
            field_mappings: Vec::new(),
            transformation_rules: Vec::new(),
            document_id_field: None,
            order_key: None,
            watermark_column: None,
            watermark_tiebreaker: None,
            schedule_interval: None,
            is_active: true,
            last_watermark: None,
            last_sync_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<ConfigId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_mappings(mut self, mappings: Vec<FieldMapping>) -> Self {
        self.field_mappings = mappings;
        self
    }

    pub fn with_rules(mut self, rules: Vec<TransformationRule>) -> Self {
        self.transformation_rules = rules;
        self
    }

    pub fn with_watermark(mut self, column: impl Into<String>, tiebreaker: Option<String>) -> Self {
        self.watermark_column = Some(column.into());
        self.watermark_tiebreaker = tiebreaker;
        self
    }

    pub fn with_document_id(mut self, field: impl Into<String>) -> Self {
        self.document_id_field = Some(field.into());
        self
    }

    pub fn with_order_key(mut self, column: impl Into<String>) -> Self {
        self.order_key = Some(column.into());
        self
    }

    /// The source column extraction pages are ordered by, if one is known.
    pub fn paging_key(&self) -> Option<String> {
        if let Some(key) = &self.order_key {
            return Some(key.clone());
        }
        let id_field = self.document_id_field.as_ref()?;
        if self.field_mappings.is_empty() {
            return Some(id_field.clone());
        }
        self.field_mappings
            .iter()
            .find(|m| m.destination_field == *id_field)
            .map(|m| m.source_field.clone())
    }

    pub fn supports_incremental(&self) -> bool {
        self.watermark_column.is_some()
    }

    /// The predicate an incremental run starts from, if the configuration
    /// has a watermark column.
    pub fn watermark_bound(&self) -> Option<WatermarkBound> {
        self.watermark_column.as_ref().map(|column| {
            WatermarkBound::new(column.clone())
                .with_tiebreaker(self.watermark_tiebreaker.clone())
                .after(self.last_watermark.clone())
        })
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
