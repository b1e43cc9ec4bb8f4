use crate::{
    error::TransformError,
    transform::{mapping::FieldMapper, rules::RuleTransform},
};
use model::{
    execution::job::JobSpec,
    records::{document::Document, row::RowData},
    transform::{mapping::FieldMapping, rule::TransformationRule},
};
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

/// A document-to-document step run after field mapping.
pub trait Transform: Send + Sync {
    fn apply(&self, doc: Document) -> Result<Document, TransformError>;

    fn name(&self) -> &str;
}

/// Field mapping followed by transformation rules in declared order.
#[derive(Clone)]
pub struct TransformPipeline {
    mapper: FieldMapper,
    transforms: Vec<Arc<dyn Transform>>,
    id_field: Option<String>,
}

impl TransformPipeline {
    pub fn new(mapper: FieldMapper) -> Self {
        Self {
            mapper,
            transforms: Vec::new(),
            id_field: None,
        }
    }

    pub fn add_transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    /// Destination field whose value becomes the document id.
    pub fn with_id_field(mut self, field: Option<String>) -> Self {
        self.id_field = field;
        self
    }

    pub fn from_spec(spec: &JobSpec) -> Result<Self, TransformError> {
        Self::from_parts(
            &spec.field_mappings,
            &spec.transformation_rules,
            spec.document_id_field.clone(),
        )
    }

    /// Builds the pipeline, rejecting mappings that name unknown rules and
    /// rules that cannot be applied.
    pub fn from_parts(
        mappings: &[FieldMapping],
        rules: &[TransformationRule],
        id_field: Option<String>,
    ) -> Result<Self, TransformError> {
        let rule_ids: HashSet<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        if let Some(unknown) = mappings
            .iter()
            .filter_map(|m| m.transform_id.as_deref())
            .find(|id| !rule_ids.contains(id))
        {
            return Err(TransformError::UnknownRule(unknown.to_string()));
        }

        let mut pipeline = Self::new(FieldMapper::new(mappings.to_vec())).with_id_field(id_field);
        for rule in rules {
            pipeline = pipeline.add_transform(RuleTransform::new(rule.clone(), mappings)?);
        }
        debug!(
            mappings = mappings.len(),
            rules = pipeline.transforms.len(),
            "Built transform pipeline"
        );
        Ok(pipeline)
    }

    pub fn apply(&self, row: &RowData) -> Result<Document, TransformError> {
        let doc = self.mapper.apply(row)?;
        let doc = self
            .transforms
            .iter()
            .try_fold(doc, |acc, transform| transform.apply(acc))?;

        let id = self
            .id_field
            .as_deref()
            .and_then(|field| doc.get(field))
            .and_then(|value| value.as_string());
        Ok(doc.with_id(id))
    }

    /// Transforms a whole batch; the first failing row fails it.
    pub fn apply_all(&self, rows: &[RowData]) -> Result<Vec<Document>, TransformError> {
        rows.iter().map(|row| self.apply(row)).collect()
    }
}
