use crate::{
    error::SchemaError,
    schema::{JoinInfo, QueryAnalysis, introspector::SchemaIntrospector},
};
use model::transform::{mapping::FieldMapping, rule::TransformationRule};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Suggested mapping for a query. Nothing here is persisted or executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoMapping {
    pub destination_index: String,
    pub suggested_mappings: Vec<FieldMapping>,
    /// Empty by default. Callers add rules such as value normalization.
    pub transformation_rules: Vec<TransformationRule>,
    pub joins: Vec<JoinInfo>,
}

pub async fn generate_auto_mapping(
    introspector: &SchemaIntrospector,
    query: &str,
    destination_index: &str,
) -> Result<AutoMapping, SchemaError> {
    let analysis = introspector.analyze_query(query).await?;
    let mapping = suggest(&analysis, destination_index);
    info!(
        index = destination_index,
        fields = mapping.suggested_mappings.len(),
        "Generated auto mapping"
    );
    Ok(mapping)
}

/// One identity mapping per analyzed column, named in lower case.
pub fn suggest(analysis: &QueryAnalysis, destination_index: &str) -> AutoMapping {
    let suggested_mappings = analysis
        .columns
        .iter()
        .map(|col| {
            FieldMapping::new(
                col.field.clone(),
                col.field.to_lowercase(),
                col.destination_type.clone(),
            )
            .with_source_type(col.source_type.clone())
        })
        .collect();

    AutoMapping {
        destination_index: destination_index.to_string(),
        suggested_mappings,
        transformation_rules: Vec::new(),
        joins: analysis.joins.clone(),
    }
}
