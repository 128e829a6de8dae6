//! Mock host backend for testing.
//!
//! Records all actions and serves pre-configured query answers, making it
//! easy to write deterministic tests for the handlers.

use std::collections::{BTreeMap, HashSet};

use crate::network::InterfaceAddr;
use crate::types::action::HostAction;
use crate::types::relation::{Advertisement, RelationData};

use super::HostBackend;

/// A test double that records actions and answers queries from fields.
pub struct MockHost {
    /// All actions executed against this backend, in order.
    pub actions: Vec<HostAction>,
    pub unit_name: String,
    pub address: String,
    pub addresses: Vec<InterfaceAddr>,
    /// Packages reported as already installed.
    pub installed: HashSet<String>,
    /// Packages reported as having a newer candidate.
    pub upgradable: HashSet<String>,
    /// Relation name -> ids, and id -> (unit, data), for `relation_*` queries.
    pub relations: BTreeMap<String, Vec<String>>,
    pub units: BTreeMap<String, Vec<(String, RelationData)>>,
    /// Action keys that fail every time they are executed.
    pub failing: HashSet<String>,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost {
            actions: Vec::new(),
            unit_name: "neutron-api/0".into(),
            address: "10.0.0.1".into(),
            addresses: Vec::new(),
            installed: HashSet::new(),
            upgradable: HashSet::new(),
            relations: BTreeMap::new(),
            units: BTreeMap::new(),
            failing: HashSet::new(),
        }
    }

    /// Make every execution of the action with this key fail.
    pub fn fail_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    /// Every advertisement published so far.
    pub fn published(&self) -> Vec<&Advertisement> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                HostAction::RelationSet { advertisement } => Some(advertisement),
                _ => None,
            })
            .collect()
    }

    /// Services touched by restart/stop/start actions, in order, tagged with
    /// the verb used.
    pub fn service_calls(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                HostAction::ServiceRestart { service } => Some(format!("restart {}", service)),
                HostAction::ServiceStop { service } => Some(format!("stop {}", service)),
                HostAction::ServiceStart { service } => Some(format!("start {}", service)),
                _ => None,
            })
            .collect()
    }

    /// Clear all recorded actions.
    pub fn clear_actions(&mut self) {
        self.actions.clear();
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend for MockHost {
    fn execute_action(&mut self, action: &HostAction) -> Result<(), String> {
        if self.failing.contains(&action.key()) {
            return Err(format!("mock: {} refused", action.key()));
        }
        if let HostAction::AptInstall { packages } = action {
            self.installed.extend(packages.iter().cloned());
        }
        self.actions.push(action.clone());
        Ok(())
    }

    fn local_unit(&self) -> Result<String, String> {
        Ok(self.unit_name.clone())
    }

    fn private_address(&self) -> Result<String, String> {
        Ok(self.address.clone())
    }

    fn relation_ids(&self, relation: &str) -> Result<Vec<String>, String> {
        Ok(self.relations.get(relation).cloned().unwrap_or_default())
    }

    fn related_units(&self, relation_id: &str) -> Result<Vec<String>, String> {
        Ok(self
            .units
            .get(relation_id)
            .map(|us| us.iter().map(|(u, _)| u.clone()).collect())
            .unwrap_or_default())
    }

    fn relation_get(&self, relation_id: &str, unit: &str) -> Result<RelationData, String> {
        self.units
            .get(relation_id)
            .and_then(|us| us.iter().find(|(u, _)| u == unit))
            .map(|(_, d)| d.clone())
            .ok_or_else(|| format!("mock: no data for {} on {}", unit, relation_id))
    }

    fn interfaces(&self) -> Result<Vec<InterfaceAddr>, String> {
        Ok(self.addresses.clone())
    }

    fn missing_packages(&self, packages: &[String]) -> Result<Vec<String>, String> {
        Ok(packages
            .iter()
            .filter(|p| !self.installed.contains(*p))
            .cloned()
            .collect())
    }

    fn upgrade_available(&self, package: &str) -> Result<bool, String> {
        Ok(self.upgradable.contains(package))
    }
}
