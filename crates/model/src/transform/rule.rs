use serde::{Deserialize, Serialize};

/// A named transformation applied to documents after field mapping,
/// in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRule {
    pub id: String,

    /// Destination field the rule targets. When absent the rule applies to
    /// the fields whose mapping names it, or to every field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(flatten)]
    pub op: RuleOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleOp {
    Trim,
    Lowercase,
    Uppercase,
    Replace {
        from: String,
        to: String,
    },
    /// Replaces null or missing values.
    DefaultValue {
        value: serde_json::Value,
    },
    Remove,
    /// Joins the string forms of `fields` into the target field.
    Concat {
        fields: Vec<String>,
        #[serde(default)]
        separator: String,
    },
}

impl RuleOp {
    pub fn name(&self) -> &'static str {
        match self {
            RuleOp::Trim => "trim",
            RuleOp::Lowercase => "lowercase",
            RuleOp::Uppercase => "uppercase",
            RuleOp::Replace { .. } => "replace",
            RuleOp::DefaultValue { .. } => "default_value",
            RuleOp::Remove => "remove",
            RuleOp::Concat { .. } => "concat",
        }
    }
}

impl TransformationRule {
    pub fn new(id: impl Into<String>, op: RuleOp) -> Self {
        TransformationRule {
            id: id.into(),
            field: None,
            op,
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}
