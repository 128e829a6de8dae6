//! Host backends: the boundary between the reconciliation core and the
//! machine it runs on.
//!
//! Provides the `HostBackend` trait and implementations for the hook tools of
//! a real unit (`command`) and a recording double (`mock`). The command backend
//! only builds command strings; executing them is delegated to a
//! `CommandRunner`, keeping process spawning out of the core logic.

pub mod command;
pub mod mock;
pub mod runner;

use crate::network::InterfaceAddr;
use crate::types::action::HostAction;
use crate::types::relation::RelationData;

/// Everything the core needs from its host: side effects through
/// `execute_action`, and a handful of read-only queries.
pub trait HostBackend {
    /// Carry out a single side effect.
    fn execute_action(&mut self, action: &HostAction) -> Result<(), String>;

    /// Name of the unit this agent runs as, e.g. `neutron-api/0`.
    fn local_unit(&self) -> Result<String, String>;

    /// The unit's primary address.
    fn private_address(&self) -> Result<String, String>;

    /// Relation ids currently established for a relation name.
    fn relation_ids(&self, relation: &str) -> Result<Vec<String>, String>;

    /// Remote units present on a relation id.
    fn related_units(&self, relation_id: &str) -> Result<Vec<String>, String>;

    /// All settings a remote unit published on a relation id.
    fn relation_get(&self, relation_id: &str, unit: &str) -> Result<RelationData, String>;

    /// Addresses configured on local network interfaces.
    fn interfaces(&self) -> Result<Vec<InterfaceAddr>, String>;

    /// The subset of `packages` not yet installed, in input order.
    fn missing_packages(&self, packages: &[String]) -> Result<Vec<String>, String>;

    /// Whether a newer candidate version of `package` is available.
    fn upgrade_available(&self, package: &str) -> Result<bool, String>;
}

#[cfg(test)]
mod tests {
    use super::mock::MockHost;
    use super::*;

    #[test]
    fn mock_implements_host_backend() {
        let host = MockHost::new();
        let _: &dyn HostBackend = &host;
    }
}
