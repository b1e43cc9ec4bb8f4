use serde::{Deserialize, Serialize};

const CODE_UNKNOWN_SOURCE_FIELD: &str = "UNKNOWN_SOURCE_FIELD";
const CODE_MISSING_SOURCE_TYPE: &str = "MISSING_SOURCE_TYPE";
const CODE_UNKNOWN_DESTINATION_TYPE: &str = "UNKNOWN_DESTINATION_TYPE";
const CODE_INCOMPATIBLE_TYPE: &str = "INCOMPATIBLE_TYPE";
const CODE_LOSSY_CONVERSION: &str = "LOSSY_CONVERSION";
const CODE_DUPLICATE_DESTINATION: &str = "DUPLICATE_DESTINATION";

/// One problem found in a field mapping.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingIssue {
    pub field: String,
    pub code: String, // stable programmatic id
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl MappingIssue {
    pub fn new(field: &str, code: &str, reason: String, suggestion: Option<String>) -> Self {
        MappingIssue {
            field: field.to_string(),
            code: code.to_string(),
            reason,
            suggestion,
        }
    }

    pub fn unknown_source_field(field: &str) -> Self {
        Self::new(
            field,
            CODE_UNKNOWN_SOURCE_FIELD,
            format!("Source field `{field}` is not produced by the source query"),
            Some("Check the column name against the analyzed query.".into()),
        )
    }

    pub fn missing_source_type(field: &str) -> Self {
        Self::new(
            field,
            CODE_MISSING_SOURCE_TYPE,
            format!("Source type of `{field}` is unknown"),
            Some("Declare `source_type` or validate against the analyzed query.".into()),
        )
    }

    pub fn unknown_destination_type(field: &str, declared: &str) -> Self {
        Self::new(
            field,
            CODE_UNKNOWN_DESTINATION_TYPE,
            format!("Destination type `{declared}` is not recognized"),
            None,
        )
    }

    pub fn incompatible(field: &str, source: &str, declared: &str, expected: &str) -> Self {
        Self::new(
            field,
            CODE_INCOMPATIBLE_TYPE,
            format!("Source type {source} cannot be stored as `{declared}`"),
            Some(format!("Use `{expected}`.")),
        )
    }

    pub fn lossy(field: &str, declared: &str, expected: &str, detail: &str) -> Self {
        Self::new(
            field,
            CODE_LOSSY_CONVERSION,
            format!("Mapping to `{declared}` instead of `{expected}`: {detail}"),
            None,
        )
    }

    pub fn duplicate_destination(field: &str, destination: &str) -> Self {
        Self::new(
            field,
            CODE_DUPLICATE_DESTINATION,
            format!("Destination field `{destination}` is mapped more than once; the last value wins"),
            None,
        )
    }
}

/// Outcome of validating a set of field mappings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<MappingIssue>,
    pub warnings: Vec<MappingIssue>,
}

impl ValidationReport {
    pub fn new(errors: Vec<MappingIssue>, warnings: Vec<MappingIssue>) -> Self {
        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
