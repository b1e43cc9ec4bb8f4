use crate::{error::TransformError, transform::coerce::coerce};
use model::{
    core::value::FieldValue,
    records::{document::Document, row::RowData},
    transform::mapping::FieldMapping,
};

/// Renames and coerces source columns into document fields.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    mappings: Vec<FieldMapping>,
}

impl FieldMapper {
    pub fn new(mappings: Vec<FieldMapping>) -> Self {
        Self { mappings }
    }

    /// Without mappings every column is copied under its lower-cased name,
    /// uncoerced.
    pub fn apply(&self, row: &RowData) -> Result<Document, TransformError> {
        if self.mappings.is_empty() {
            let fields = row
                .field_values
                .iter()
                .map(|fv| FieldValue::new(fv.name.to_lowercase(), fv.value.clone()))
                .collect();
            return Ok(Document::new(fields));
        }

        let mut doc = Document::default();
        for mapping in &self.mappings {
            let source = row
                .get(&mapping.source_field)
                .ok_or_else(|| TransformError::MissingField(mapping.source_field.clone()))?;
            let value = coerce(
                &mapping.destination_field,
                source.value.clone(),
                &mapping.destination_type,
            )?;
            doc.set(&mapping.destination_field, value);
        }
        Ok(doc)
    }
}
