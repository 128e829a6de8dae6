use serde::{Deserialize, Serialize};

/// A single inbound hook invocation.
///
/// Relation hooks carry the relation id and the remote unit that triggered
/// them; lifecycle hooks (`install`, `config-changed`, ...) carry neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_unit: Option<String>,
}

impl Event {
    pub fn new(name: &str) -> Self {
        Event {
            name: name.to_string(),
            relation_id: None,
            remote_unit: None,
        }
    }

    pub fn on_relation(name: &str, relation_id: &str, remote_unit: Option<&str>) -> Self {
        Event {
            name: name.to_string(),
            relation_id: Some(relation_id.to_string()),
            remote_unit: remote_unit.map(|u| u.to_string()),
        }
    }

    /// The relation name for `<relation>-relation-<phase>` hooks.
    pub fn relation_name(&self) -> Option<&str> {
        self.name
            .rfind("-relation-")
            .map(|idx| &self.name[..idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_name_from_hook() {
        let ev = Event::on_relation("shared-db-relation-changed", "shared-db:3", Some("mysql/0"));
        assert_eq!(ev.relation_name(), Some("shared-db"));
    }

    #[test]
    fn lifecycle_hook_has_no_relation() {
        assert_eq!(Event::new("config-changed").relation_name(), None);
    }

    #[test]
    fn serde_skips_empty_context() {
        let json = serde_json::to_string(&Event::new("install")).unwrap();
        assert_eq!(json, r#"{"name":"install"}"#);
    }
}
