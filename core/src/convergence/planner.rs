//! Restart planner: diffs file checksums taken before and after a handler
//! and emits the minimal set of service actions.
//!
//! The planner is stateless: it takes the two snapshots and the restart map
//! and returns actions. It never executes anything itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::render::ServiceRestartMap;
use crate::types::action::HostAction;

/// SHA-256 hex digest per watched path. `None` means the file did not exist.
pub type ChecksumSnapshot = BTreeMap<PathBuf, Option<String>>;

/// How a handler's affected services are bounced once it succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMode {
    /// `restart` each affected service.
    Restart,
    /// Stop every affected service, then start them all.
    StopStart,
    /// Never touch services.
    None,
}

/// Paths whose checksum differs between the two snapshots.
///
/// A path missing from `after` is treated as unchanged.
pub fn changed_paths<'a>(before: &ChecksumSnapshot, after: &'a ChecksumSnapshot) -> Vec<&'a Path> {
    after
        .iter()
        .filter(|(path, sum)| before.get(*path) != Some(*sum))
        .map(|(path, _)| path.as_path())
        .collect()
}

/// Services to bounce, deduplicated, in restart-map order.
pub fn affected_services(
    before: &ChecksumSnapshot,
    after: &ChecksumSnapshot,
    restart_map: &ServiceRestartMap,
) -> Vec<String> {
    let changed = changed_paths(before, after);
    let mut services: Vec<String> = Vec::new();
    for (path, deps) in restart_map.iter() {
        if !changed.contains(&path) {
            continue;
        }
        for svc in deps {
            if !services.contains(svc) {
                services.push(svc.clone());
            }
        }
    }
    services
}

/// Compute the service actions that follow a successful handler.
///
/// Returns, in execution order:
/// - `Restart`: one `ServiceRestart` per affected service.
/// - `StopStart`: every `ServiceStop`, then every `ServiceStart`.
/// - `None`: nothing.
pub fn plan_restarts(
    before: &ChecksumSnapshot,
    after: &ChecksumSnapshot,
    restart_map: &ServiceRestartMap,
    mode: RestartMode,
) -> Vec<HostAction> {
    if mode == RestartMode::None {
        return Vec::new();
    }
    let services = affected_services(before, after, restart_map);
    match mode {
        RestartMode::Restart => services
            .into_iter()
            .map(|service| HostAction::ServiceRestart { service })
            .collect(),
        RestartMode::StopStart => {
            let mut actions: Vec<HostAction> = services
                .iter()
                .map(|s| HostAction::ServiceStop { service: s.clone() })
                .collect();
            actions.extend(
                services
                    .into_iter()
                    .map(|service| HostAction::ServiceStart { service }),
            );
            actions
        }
        RestartMode::None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restart_map() -> ServiceRestartMap {
        let mut map = ServiceRestartMap::new();
        map.insert("/etc/neutron/neutron.conf", &["neutron-server"]);
        map.insert("/etc/haproxy/haproxy.cfg", &["haproxy"]);
        map.insert("/etc/neutron/plugins/ml2/ml2_conf.ini", &["neutron-server"]);
        map
    }

    fn snap(entries: &[(&str, Option<&str>)]) -> ChecksumSnapshot {
        entries
            .iter()
            .map(|(p, s)| (PathBuf::from(p), s.map(String::from)))
            .collect()
    }

    #[test]
    fn no_changes_produces_empty() {
        let before = snap(&[("/etc/neutron/neutron.conf", Some("aa")), ("/etc/haproxy/haproxy.cfg", None)]);
        let actions = plan_restarts(&before, &before.clone(), &restart_map(), RestartMode::Restart);
        assert!(actions.is_empty());
    }

    #[test]
    fn created_file_counts_as_change() {
        let before = snap(&[("/etc/haproxy/haproxy.cfg", None)]);
        let after = snap(&[("/etc/haproxy/haproxy.cfg", Some("bb"))]);
        let actions = plan_restarts(&before, &after, &restart_map(), RestartMode::Restart);
        assert_eq!(actions, vec![HostAction::ServiceRestart { service: "haproxy".into() }]);
    }

    #[test]
    fn shared_service_restarted_once() {
        let before = snap(&[
            ("/etc/neutron/neutron.conf", Some("a")),
            ("/etc/neutron/plugins/ml2/ml2_conf.ini", Some("b")),
        ]);
        let after = snap(&[
            ("/etc/neutron/neutron.conf", Some("a2")),
            ("/etc/neutron/plugins/ml2/ml2_conf.ini", Some("b2")),
        ]);
        let actions = plan_restarts(&before, &after, &restart_map(), RestartMode::Restart);
        assert_eq!(actions, vec![HostAction::ServiceRestart { service: "neutron-server".into() }]);
    }

    #[test]
    fn stop_start_orders_all_stops_first() {
        let before = snap(&[("/etc/neutron/neutron.conf", Some("a")), ("/etc/haproxy/haproxy.cfg", Some("b"))]);
        let after = snap(&[("/etc/neutron/neutron.conf", Some("x")), ("/etc/haproxy/haproxy.cfg", Some("y"))]);
        let actions = plan_restarts(&before, &after, &restart_map(), RestartMode::StopStart);
        assert_eq!(
            actions,
            vec![
                HostAction::ServiceStop { service: "neutron-server".into() },
                HostAction::ServiceStop { service: "haproxy".into() },
                HostAction::ServiceStart { service: "neutron-server".into() },
                HostAction::ServiceStart { service: "haproxy".into() },
            ]
        );
    }

    #[test]
    fn mode_none_ignores_changes() {
        let before = snap(&[("/etc/neutron/neutron.conf", Some("a"))]);
        let after = snap(&[("/etc/neutron/neutron.conf", Some("b"))]);
        assert!(plan_restarts(&before, &after, &restart_map(), RestartMode::None).is_empty());
    }

    #[test]
    fn unmapped_path_restarts_nothing() {
        let before = snap(&[("/etc/motd", Some("a"))]);
        let after = snap(&[("/etc/motd", Some("b"))]);
        assert!(affected_services(&before, &after, &restart_map()).is_empty());
        assert_eq!(changed_paths(&before, &after), vec![Path::new("/etc/motd")]);
    }
}
