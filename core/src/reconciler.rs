//! Per-invocation runtime.
//!
//! The `Reconciler` owns everything one hook invocation reads (settings,
//! relation facts, local addressing) and routes everything it changes
//! (managed files, patched keys, host actions) into a `Journal`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::context::{BuildEnv, ContextBuilder};
use crate::convergence::executor::ConvergenceExecutor;
use crate::convergence::planner::{plan_restarts, ChecksumSnapshot, RestartMode};
use crate::convergence::retry::RetryPolicy;
use crate::error::{AgentError, Result};
use crate::facts::FactStore;
use crate::infrastructure::HostBackend;
use crate::network::NetworkInfo;
use crate::patcher::{self, PatchOutcome};
use crate::render::{register_configs, resolve_under, ConfigRegistry, RenderReport};
use crate::types::action::HostAction;
use crate::types::config::LocalSettings;
use crate::types::relation::Advertisement;

/// Record of everything an invocation changed, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    pub written: Vec<PathBuf>,
    pub patched: Vec<PathBuf>,
    /// Host actions that were applied successfully.
    pub actions: Vec<HostAction>,
}

impl Journal {
    /// Every advertisement published, in order.
    pub fn published(&self) -> Vec<&Advertisement> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                HostAction::RelationSet { advertisement } => Some(advertisement),
                _ => None,
            })
            .collect()
    }

    /// Service actions, as `"<verb> <service>"`.
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
}

/// Per-invocation runtime for hook handlers. Owns settings, the fact
/// snapshot, the managed-file registry and the host backend.
///
/// Handlers read through it and mutate the world only through its methods,
/// so every write and host action lands in the journal.
pub struct Reconciler {
    settings: LocalSettings,
    facts: FactStore,
    net: NetworkInfo,
    configs: ConfigRegistry,
    host: Box<dyn HostBackend>,
    executor: ConvergenceExecutor,
    root: PathBuf,
    journal: Journal,
}

impl Reconciler {
    /// Build a reconciler whose managed files live under `root` (`/` on a
    /// real unit).
    pub fn new(
        settings: LocalSettings,
        facts: FactStore,
        net: NetworkInfo,
        host: Box<dyn HostBackend>,
        root: &Path,
    ) -> Reconciler {
        let configs = register_configs(&settings, root);
        Reconciler {
            settings,
            facts,
            net,
            configs,
            host,
            executor: ConvergenceExecutor::new(RetryPolicy::default()),
            root: root.to_path_buf(),
            journal: Journal::default(),
        }
    }

    /// Replace the retry policy for host actions.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Reconciler {
        self.executor = ConvergenceExecutor::new(policy);
        self
    }

    pub fn settings(&self) -> &LocalSettings {
        &self.settings
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn net(&self) -> &NetworkInfo {
        &self.net
    }

    pub fn configs(&self) -> &ConfigRegistry {
        &self.configs
    }

    pub fn host(&self) -> &dyn HostBackend {
        self.host.as_ref()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn env(&self) -> BuildEnv<'_> {
        BuildEnv::new(&self.settings, &self.facts, &self.net)
    }

    /// Where a logical path lives on disk.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_under(&self.root, path)
    }

    /// Render a single builder against the current inputs.
    pub fn build(&self, builder: &dyn ContextBuilder) -> Option<crate::context::ConfigFragment> {
        builder.render(&self.env())
    }

    pub fn complete_contexts(&self) -> Vec<&'static str> {
        self.configs.complete_contexts(&self.env())
    }

    pub fn is_complete(&self, context: &str) -> bool {
        self.complete_contexts().contains(&context)
    }

    // -- file writes ------------------------------------------------------

    pub fn write_all(&mut self) -> Result<RenderReport> {
        let result = self.configs.render_all(&self.env());
        self.record(result)
    }

    pub fn write(&mut self, path: &str) -> Result<RenderReport> {
        let result = self.configs.render_one(Path::new(path), &self.env());
        self.record(result)
    }

    fn record(&mut self, result: Result<RenderReport>) -> Result<RenderReport> {
        let report = result?;
        self.journal.written.extend(report.written.iter().cloned());
        Ok(report)
    }

    /// Set `key = value` in an unmanaged file.
    pub fn patch(&mut self, path: &str, key: &str, value: &str) -> Result<PatchOutcome> {
        let outcome = patcher::patch(&self.resolve(Path::new(path)), key, value)?;
        self.record_patch(path, outcome);
        Ok(outcome)
    }

    /// Remove `key` from an unmanaged file.
    pub fn unset(&mut self, path: &str, key: &str) -> Result<PatchOutcome> {
        let outcome = patcher::unset(&self.resolve(Path::new(path)), key)?;
        self.record_patch(path, outcome);
        Ok(outcome)
    }

    /// Create an unmanaged file with `content` unless it already exists.
    /// Returns whether it was created.
    pub fn seed(&mut self, path: &str, content: &str) -> Result<bool> {
        let on_disk = self.resolve(Path::new(path));
        if on_disk.exists() {
            return Ok(false);
        }
        if let Some(parent) = on_disk.parent() {
            fs::create_dir_all(parent).map_err(|e| AgentError::file_access(parent, e))?;
        }
        patcher::write_atomic(&on_disk, content.as_bytes())?;
        info!(path, "seeded file");
        self.record_patch(path, PatchOutcome::Appended);
        Ok(true)
    }

    fn record_patch(&mut self, path: &str, outcome: PatchOutcome) {
        if outcome != PatchOutcome::Unchanged && !self.journal.patched.iter().any(|p| p == Path::new(path)) {
            self.journal.patched.push(PathBuf::from(path));
        }
    }

    // -- host actions -----------------------------------------------------

    /// Apply host actions in order; the first unrecoverable failure aborts.
    pub fn run(&mut self, actions: Vec<HostAction>) -> Result<()> {
        if actions.is_empty() {
            return Ok(());
        }
        let result = self.executor.execute(actions, self.host.as_mut());
        self.journal.actions.extend(result.succeeded.iter().cloned());
        result.into_result().map(|_| ())
    }

    /// Publish relation settings.
    pub fn publish(&mut self, advertisement: Advertisement) -> Result<()> {
        info!(
            relation_id = advertisement.relation_id.as_deref().unwrap_or("-"),
            keys = ?advertisement.settings.keys().collect::<Vec<_>>(),
            "relation-set"
        );
        self.run(vec![HostAction::RelationSet { advertisement }])
    }

    pub fn upgrade_available(&self, package: &str) -> Result<bool> {
        self.host
            .upgrade_available(package)
            .map_err(|e| AgentError::Host {
                action: format!("apt-cache policy {}", package),
                message: e,
            })
    }

    // -- restarts ---------------------------------------------------------

    pub fn checksums(&self) -> ChecksumSnapshot {
        self.configs.checksums()
    }

    /// Bounce services whose files changed since `before`.
    pub fn apply_restarts(&mut self, before: &ChecksumSnapshot, mode: RestartMode) -> Result<Vec<HostAction>> {
        let after = self.checksums();
        let actions = plan_restarts(before, &after, &self.configs.restart_map(), mode);
        if actions.is_empty() {
            debug!("no service restarts needed");
            return Ok(actions);
        }
        info!(actions = ?actions.iter().map(HostAction::key).collect::<Vec<_>>(), "restarting services");
        self.run(actions.clone())?;
        Ok(actions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::mock::MockHost;
    use crate::network::InterfaceAddr;
    use tempfile::TempDir;

    pub fn reconciler(dir: &TempDir, settings: LocalSettings, facts: FactStore, host: MockHost) -> Reconciler {
        let net = NetworkInfo::new(
            "10.0.0.1",
            vec![
                InterfaceAddr::new("eth0", "10.0.0.1/24").unwrap(),
                InterfaceAddr::new("eth1", "2001:db8::1/64").unwrap(),
            ],
        );
        Reconciler::new(settings, facts, net, Box::new(host), dir.path())
            .with_retry_policy(RetryPolicy::new(1, 0))
    }

    #[test]
    fn write_all_journals_written_files() {
        let dir = TempDir::new().unwrap();
        let mut rec = reconciler(&dir, LocalSettings::default(), FactStore::new("neutron-api/0"), MockHost::new());
        let report = rec.write_all().unwrap();
        assert!(!report.written.is_empty());
        assert_eq!(rec.journal().written, report.written);
        assert!(dir.path().join("etc/neutron/neutron.conf").exists());
    }

    #[test]
    fn restarts_follow_checksum_changes() {
        let dir = TempDir::new().unwrap();
        let mut rec = reconciler(&dir, LocalSettings::default(), FactStore::new("neutron-api/0"), MockHost::new());
        let before = rec.checksums();
        rec.write_all().unwrap();
        let actions = rec.apply_restarts(&before, RestartMode::Restart).unwrap();
        assert_eq!(
            actions,
            vec![
                HostAction::ServiceRestart { service: "neutron-server".into() },
                HostAction::ServiceRestart { service: "haproxy".into() },
                HostAction::ServiceRestart { service: "apache2".into() },
            ]
        );

        let before = rec.checksums();
        rec.write_all().unwrap();
        assert!(rec.apply_restarts(&before, RestartMode::Restart).unwrap().is_empty());
    }

    #[test]
    fn failed_action_is_host_error() {
        let dir = TempDir::new().unwrap();
        let host = MockHost::new().fail_on("relation_set:amqp:1");
        let mut rec = reconciler(&dir, LocalSettings::default(), FactStore::new("neutron-api/0"), host);
        let err = rec.publish(Advertisement::new(Some("amqp:1")).with("username", "neutron")).unwrap_err();
        assert!(matches!(err, AgentError::Host { .. }));
        assert!(rec.journal().published().is_empty());
    }
}
