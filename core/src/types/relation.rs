use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings a single unit has published on a single relation id.
pub type RelationData = BTreeMap<String, Value>;

/// Settings this unit publishes onto one relation.
///
/// `relation_id: None` targets the relation of the hook currently running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Advertisement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
    pub settings: RelationData,
}

impl Advertisement {
    pub fn new(relation_id: Option<&str>) -> Self {
        Advertisement {
            relation_id: relation_id.map(|r| r.to_string()),
            settings: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// `key=value` pairs as handed to `relation-set`.
    pub fn wire_pairs(&self) -> Vec<(String, String)> {
        self.settings
            .iter()
            .map(|(k, v)| (k.clone(), wire_value(v)))
            .collect()
    }
}

/// Render a fact value the way it travels over a relation.
///
/// Strings go bare, booleans as `True`/`False`, null as the empty string and
/// anything structured as compact JSON.
pub fn wire_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Textual view of a fact, treating empty strings and null as absent.
pub fn fact_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        other => Some(wire_value(other)),
    }
}
