use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// A transformed record ready to be bulk-indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Explicit document id. Re-indexing a document with the same id overwrites it.
    pub id: Option<String>,
    pub fields: Vec<FieldValue>,
}

impl Document {
    pub fn new(fields: Vec<FieldValue>) -> Self {
        Document { id: None, fields }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.value)
    }

    /// Sets a field, replacing any existing value with the same name.
    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|f| f.name == field) {
            Some(existing) => existing.value = value,
            None => self.fields.push(FieldValue::new(field, value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|f| f.name == field)?;
        Some(self.fields.remove(pos).value)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// JSON source body of the document.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}
