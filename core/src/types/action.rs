use serde::{Deserialize, Serialize};

use super::relation::Advertisement;

/// Side effects the core asks the host to perform.
///
/// Handlers never touch packages, services or relations directly; they emit
/// one of these and a `HostBackend` carries it out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostAction {
    AddSource { source: String },
    AptUpdate,
    AptInstall { packages: Vec<String> },
    AptUpgrade,
    OpenPort { port: u16 },
    ServiceRestart { service: String },
    ServiceStop { service: String },
    ServiceStart { service: String },
    EnableSite { site: String },
    DisableSite { site: String },
    RelationSet { advertisement: Advertisement },
}

impl HostAction {
    /// Stable key used for retry bookkeeping.
    pub fn key(&self) -> String {
        match self {
            HostAction::AddSource { source } => format!("add_source:{}", source),
            HostAction::AptUpdate => "apt_update".into(),
            HostAction::AptInstall { packages } => format!("apt_install:{}", packages.join(",")),
            HostAction::AptUpgrade => "apt_upgrade".into(),
            HostAction::OpenPort { port } => format!("open_port:{}", port),
            HostAction::ServiceRestart { service } => format!("service_restart:{}", service),
            HostAction::ServiceStop { service } => format!("service_stop:{}", service),
            HostAction::ServiceStart { service } => format!("service_start:{}", service),
            HostAction::EnableSite { site } => format!("enable_site:{}", site),
            HostAction::DisableSite { site } => format!("disable_site:{}", site),
            HostAction::RelationSet { advertisement } => format!(
                "relation_set:{}",
                advertisement.relation_id.as_deref().unwrap_or("-")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tagged_json() {
        let action = HostAction::ServiceRestart {
            service: "neutron-server".into(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"action\":\"service_restart\""));
        let back: HostAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn relation_set_key_uses_relation_id() {
        let action = HostAction::RelationSet {
            advertisement: Advertisement::new(Some("identity-service:4")),
        };
        assert_eq!(action.key(), "relation_set:identity-service:4");
        let current = HostAction::RelationSet {
            advertisement: Advertisement::new(None),
        };
        assert_eq!(current.key(), "relation_set:-");
    }
}
