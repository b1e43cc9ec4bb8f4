use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// One row returned by a source query, columns in projection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(field_values: Vec<FieldValue>) -> Self {
        RowData { field_values }
    }

    /// Case-insensitive column lookup.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.field_values.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for RowData {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        RowData {
            field_values: iter
                .into_iter()
                .map(|(name, value)| FieldValue::new(name, value))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let row: RowData = [("EMP_ID", Value::Int(7)), ("Name", Value::String("Ada".into()))]
            .into_iter()
            .collect();
        assert_eq!(row.get_value("emp_id"), Value::Int(7));
        assert_eq!(row.get_value("NAME"), Value::String("Ada".into()));
        assert!(row.get_value("missing").is_null());
    }
}
