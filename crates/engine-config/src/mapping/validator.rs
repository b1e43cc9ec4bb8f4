//! Type compatibility checks for proposed field mappings.
//!
//! The expected destination type of each mapping is re-derived from its
//! source type with the type mapper and compared with the declared one.
//! Both entry points are pure: identical input gives identical output.

use crate::{
    mapping::issue::{MappingIssue, ValidationReport},
    schema::AnalyzedColumn,
};
use model::{
    core::{
        field_type::{FieldType, TypeFamily},
        source_type::SourceType,
        type_map::map_source_type,
    },
    transform::mapping::FieldMapping,
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compatibility {
    Exact,
    Lossy(&'static str),
    Incompatible,
}

/// Validates mappings using their declared `source_type`s.
pub fn validate_mappings(mappings: &[FieldMapping]) -> ValidationReport {
    validate(mappings, None)
}

/// Validates mappings against the columns a query actually produces.
/// Missing source types are taken from the matching column; a mapping
/// whose source field is not among the columns is an error.
pub fn validate_against_columns(
    mappings: &[FieldMapping],
    columns: &[AnalyzedColumn],
) -> ValidationReport {
    validate(mappings, Some(columns))
}

fn validate(mappings: &[FieldMapping], columns: Option<&[AnalyzedColumn]>) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut destinations = HashSet::new();

    for mapping in mappings {
        let field = mapping.source_field.as_str();

        if !destinations.insert(mapping.destination_field.to_ascii_lowercase()) {
            warnings.push(MappingIssue::duplicate_destination(
                field,
                &mapping.destination_field,
            ));
        }

        if field.trim().is_empty() {
            errors.push(MappingIssue::unknown_source_field(field));
            continue;
        }

        let column = match columns {
            Some(columns) => match columns.iter().find(|c| c.field.eq_ignore_ascii_case(field)) {
                Some(column) => Some(column),
                None => {
                    errors.push(MappingIssue::unknown_source_field(field));
                    continue;
                }
            },
            None => None,
        };

        let Some(source_type) = mapping
            .source_type
            .as_ref()
            .or(column.map(|c| &c.source_type))
        else {
            errors.push(MappingIssue::missing_source_type(field));
            continue;
        };

        if let Some(issue) = check_types(field, source_type, &mapping.destination_type) {
            match issue {
                (issue, true) => errors.push(issue),
                (issue, false) => warnings.push(issue),
            }
        }
    }

    ValidationReport::new(errors, warnings)
}

/// Returns the issue for one mapping and whether it is an error.
fn check_types(
    field: &str,
    source_type: &SourceType,
    declared: &FieldType,
) -> Option<(MappingIssue, bool)> {
    if !declared.is_known() {
        return Some((
            MappingIssue::unknown_destination_type(field, &declared.name()),
            true,
        ));
    }

    let expected = map_source_type(source_type);
    match compatibility(&expected, declared) {
        Compatibility::Exact => None,
        Compatibility::Lossy(detail) => Some((
            MappingIssue::lossy(field, &declared.name(), &expected.name(), detail),
            false,
        )),
        Compatibility::Incompatible => Some((
            MappingIssue::incompatible(
                field,
                &source_type.to_string(),
                &declared.name(),
                &expected.name(),
            ),
            true,
        )),
    }
}

fn compatibility(expected: &FieldType, declared: &FieldType) -> Compatibility {
    use Compatibility::*;
    use TypeFamily as F;

    if expected == declared {
        return Exact;
    }

    let narrower = || match (expected.numeric_width(), declared.numeric_width()) {
        (Some(e), Some(d)) => d < e,
        _ => false,
    };

    match (expected.family(), declared.family()) {
        (F::Integer, F::Integer) if narrower() => Lossy("values may overflow the narrower type"),
        (F::Integer, F::Integer) => Exact,
        (F::Integer, F::Floating) => Lossy("large integers lose precision as floating point"),
        (F::Integer, F::String) => Lossy("numbers are indexed as text"),
        (F::Integer, F::Date) => Lossy("integers are read as epoch milliseconds"),

        (F::Floating, F::Integer) => Lossy("fractional digits are truncated"),
        (F::Floating, F::Floating) if narrower() => Lossy("floating point precision is reduced"),
        (F::Floating, F::Floating) => Exact,
        (F::Floating, F::String) => Lossy("numbers are indexed as text"),

        (F::String, F::String) => Lossy("text analysis differs between keyword and text"),

        (F::Date, F::Integer) => Lossy("dates are stored as epoch milliseconds"),
        (F::Date, F::String) => Lossy("dates are indexed as text"),

        (F::Boolean, F::Integer) => Lossy("booleans are stored as 0 and 1"),
        (F::Boolean, F::String) => Lossy("booleans are indexed as text"),

        (F::Object, F::String) => Lossy("structured values are indexed as text"),

        _ => Incompatible,
    }
}
