use crate::{error::TransformError, transform::pipeline::Transform};
use model::{
    core::value::Value,
    records::document::Document,
    transform::{
        mapping::FieldMapping,
        rule::{RuleOp, TransformationRule},
    },
};

/// Fields a rule operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// Named by the rule itself.
    Field(String),
    /// Destination fields whose mapping names the rule.
    Fields(Vec<String>),
    All,
}

impl RuleTarget {
    fn resolve(rule: &TransformationRule, mappings: &[FieldMapping]) -> Self {
        if let Some(field) = &rule.field {
            return RuleTarget::Field(field.clone());
        }
        let named: Vec<String> = mappings
            .iter()
            .filter(|m| m.transform_id.as_deref() == Some(rule.id.as_str()))
            .map(|m| m.destination_field.clone())
            .collect();
        if named.is_empty() {
            RuleTarget::All
        } else {
            RuleTarget::Fields(named)
        }
    }

    fn fields(&self, doc: &Document) -> Vec<String> {
        match self {
            RuleTarget::Field(field) => vec![field.clone()],
            RuleTarget::Fields(fields) => fields.clone(),
            RuleTarget::All => doc.field_names(),
        }
    }

    fn single(&self) -> Option<&str> {
        match self {
            RuleTarget::Field(field) => Some(field),
            RuleTarget::Fields(fields) if fields.len() == 1 => Some(&fields[0]),
            _ => None,
        }
    }
}

/// One transformation rule bound to its target fields.
#[derive(Debug, Clone)]
pub struct RuleTransform {
    rule: TransformationRule,
    target: RuleTarget,
}

impl RuleTransform {
    pub fn new(rule: TransformationRule, mappings: &[FieldMapping]) -> Result<Self, TransformError> {
        let target = RuleTarget::resolve(&rule, mappings);
        let invalid = |reason: &str| TransformError::InvalidRule {
            rule: rule.id.clone(),
            reason: reason.to_string(),
        };

        match &rule.op {
            RuleOp::Replace { from, .. } if from.is_empty() => {
                return Err(invalid("`from` must not be empty"));
            }
            RuleOp::Remove if target == RuleTarget::All => {
                return Err(invalid("remove needs a target field"));
            }
            RuleOp::Concat { fields, .. } if fields.is_empty() => {
                return Err(invalid("concat needs at least one input field"));
            }
            RuleOp::Concat { .. } if target.single().is_none() => {
                return Err(invalid("concat writes exactly one target field"));
            }
            _ => {}
        }

        Ok(RuleTransform { rule, target })
    }

    pub fn target(&self) -> &RuleTarget {
        &self.target
    }

    fn map_strings<F>(&self, mut doc: Document, f: F) -> Document
    where
        F: Fn(&str) -> String,
    {
        for field in self.target.fields(&doc) {
            if let Some(Value::String(s)) = doc.get(&field) {
                let updated = f(s);
                doc.set(&field, Value::String(updated));
            }
        }
        doc
    }
}

impl Transform for RuleTransform {
    fn apply(&self, mut doc: Document) -> Result<Document, TransformError> {
        let doc = match &self.rule.op {
            RuleOp::Trim => self.map_strings(doc, |s| s.trim().to_string()),
            RuleOp::Lowercase => self.map_strings(doc, str::to_lowercase),
            RuleOp::Uppercase => self.map_strings(doc, str::to_uppercase),
            RuleOp::Replace { from, to } => self.map_strings(doc, |s| s.replace(from, to)),
            RuleOp::DefaultValue { value } => {
                let default = Value::from_json(value);
                for field in self.target.fields(&doc) {
                    if doc.get(&field).is_none_or(Value::is_null) {
                        doc.set(&field, default.clone());
                    }
                }
                doc
            }
            RuleOp::Remove => {
                for field in self.target.fields(&doc) {
                    doc.remove(&field);
                }
                doc
            }
            RuleOp::Concat { fields, separator } => {
                let joined = fields
                    .iter()
                    .filter_map(|f| doc.get(f).and_then(Value::as_string))
                    .collect::<Vec<_>>()
                    .join(separator);
                // checked in `new`
                if let Some(target) = self.target.single() {
                    doc.set(target, Value::String(joined));
                }
                doc
            }
        };
        Ok(doc)
    }

    fn name(&self) -> &str {
        &self.rule.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::{field_type::FieldType, value::FieldValue};
    use serde_json::json;

    fn doc() -> Document {
        Document::new(vec![
            FieldValue::new("first", Value::String("  Ada ".into())),
            FieldValue::new("last", Value::String("Lovelace".into())),
            FieldValue::new("age", Value::Int(36)),
            FieldValue::new("dept", Value::Null),
        ])
    }

    fn apply(rule: TransformationRule, mappings: &[FieldMapping]) -> Document {
        RuleTransform::new(rule, mappings).unwrap().apply(doc()).unwrap()
    }

    #[test]
    fn field_rules_touch_only_their_field() {
        let out = apply(TransformationRule::new("t", RuleOp::Uppercase).on_field("last"), &[]);
        assert_eq!(out.get("last"), Some(&Value::String("LOVELACE".into())));
        assert_eq!(out.get("first"), Some(&Value::String("  Ada ".into())));
    }

    #[test]
    fn untargeted_rules_apply_to_all_string_fields() {
        let out = apply(TransformationRule::new("t", RuleOp::Trim), &[]);
        assert_eq!(out.get("first"), Some(&Value::String("Ada".into())));
        assert_eq!(out.get("age"), Some(&Value::Int(36)));
    }

    #[test]
    fn mappings_can_name_their_rule() {
        let mappings = vec![
            FieldMapping::new("FIRST", "first", FieldType::Text).with_transform("lower"),
            FieldMapping::new("LAST", "last", FieldType::Text),
        ];
        let out = apply(TransformationRule::new("lower", RuleOp::Lowercase), &mappings);
        assert_eq!(out.get("first"), Some(&Value::String("  ada ".into())));
        assert_eq!(out.get("last"), Some(&Value::String("Lovelace".into())));
    }

    #[test]
    fn defaults_fill_nulls_and_missing_fields() {
        let all = apply(
            TransformationRule::new("d", RuleOp::DefaultValue { value: json!("n/a") }),
            &[],
        );
        assert_eq!(all.get("dept"), Some(&Value::String("n/a".into())));
        assert_eq!(all.get("age"), Some(&Value::Int(36)));

        let one = apply(
            TransformationRule::new("d", RuleOp::DefaultValue { value: json!(0) }).on_field("bonus"),
            &[],
        );
        assert_eq!(one.get("bonus"), Some(&Value::Int(0)));
    }

    #[test]
    fn concat_and_remove() {
        let concat = TransformationRule::new(
            "c",
            RuleOp::Concat {
                fields: vec!["last".into(), "age".into(), "missing".into()],
                separator: "-".into(),
            },
        )
        .on_field("label");
        assert_eq!(
            apply(concat, &[]).get("label"),
            Some(&Value::String("Lovelace-36".into()))
        );

        let removed = apply(TransformationRule::new("r", RuleOp::Remove).on_field("age"), &[]);
        assert!(removed.get("age").is_none());
    }

    #[test]
    fn malformed_rules_are_rejected() {
        assert!(RuleTransform::new(TransformationRule::new("r", RuleOp::Remove), &[]).is_err());
        let concat = TransformationRule::new(
            "c",
            RuleOp::Concat {
                fields: vec!["a".into()],
                separator: String::new(),
            },
        );
        assert!(matches!(
            RuleTransform::new(concat, &[]),
            Err(TransformError::InvalidRule { .. })
        ));
    }
}
