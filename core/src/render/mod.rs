//! Config renderer: owns the set of managed files and writes them only when
//! their content changes.
//!
//! A `ConfigRegistry` is built once per invocation. Each managed file names a
//! template, the builders feeding it (merged in registration order, last
//! writer wins) and the services that depend on it. Watch-only entries have
//! no template: they are patched elsewhere but still contribute to the
//! restart map.

pub mod manifest;
pub mod templates;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::context::{BuildEnv, ConfigFragment, ContextBuilder};
use crate::convergence::planner::ChecksumSnapshot;
use crate::error::{AgentError, Result};
use crate::patcher::write_atomic;

pub use manifest::register_configs;
pub use templates::Template;

// ---------------------------------------------------------------------------
// ServiceRestartMap
// ---------------------------------------------------------------------------

/// Ordered mapping of file path to the services that must be bounced when it
/// changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceRestartMap {
    entries: Vec<(PathBuf, Vec<String>)>,
}

impl ServiceRestartMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add services for `path`, appending to any existing entry.
    pub fn insert(&mut self, path: impl Into<PathBuf>, services: &[&str]) {
        let path = path.into();
        let idx = match self.entries.iter().position(|(p, _)| *p == path) {
            Some(i) => i,
            None => {
                self.entries.push((path, Vec::new()));
                self.entries.len() - 1
            }
        };
        let deps = &mut self.entries[idx].1;
        for svc in services {
            if !deps.iter().any(|d| d == svc) {
                deps.push(svc.to_string());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[String])> {
        self.entries.iter().map(|(p, s)| (p.as_path(), s.as_slice()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(p, _)| p.as_path())
    }

    pub fn services_for(&self, path: &Path) -> &[String] {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, s)| s.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ManagedFile
// ---------------------------------------------------------------------------

pub struct ManagedFile {
    pub path: PathBuf,
    /// `None` for watch-only files.
    pub template: Option<Template>,
    pub builders: Vec<Box<dyn ContextBuilder>>,
    pub services: Vec<String>,
    /// Skip writing entirely unless this builder is complete.
    pub requires: Option<&'static str>,
}

impl ManagedFile {
    pub fn new(path: impl Into<PathBuf>, template: Template) -> Self {
        ManagedFile {
            path: path.into(),
            template: Some(template),
            builders: Vec::new(),
            services: Vec::new(),
            requires: None,
        }
    }

    pub fn builder(mut self, builder: impl ContextBuilder + 'static) -> Self {
        self.builders.push(Box::new(builder));
        self
    }

    pub fn restarts(mut self, services: &[&str]) -> Self {
        self.services.extend(services.iter().map(|s| s.to_string()));
        self
    }

    pub fn requires(mut self, context: &'static str) -> Self {
        self.requires = Some(context);
        self
    }

    /// Merge every complete builder's fragment, in registration order.
    pub fn fragment(&self, env: &BuildEnv) -> (ConfigFragment, Vec<&'static str>) {
        let mut merged = ConfigFragment::new();
        let mut complete = Vec::new();
        for builder in &self.builders {
            if let Some(frag) = builder.render(env) {
                complete.push(builder.name());
                merged.merge(frag);
            }
        }
        (merged, complete)
    }
}

// ---------------------------------------------------------------------------
// RenderReport
// ---------------------------------------------------------------------------

/// What a render pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    /// Files whose content changed on disk.
    pub written: Vec<PathBuf>,
    /// Services depending on the written files, deduplicated.
    pub restarts: Vec<String>,
    pub failures: Vec<(PathBuf, String)>,
}

impl RenderReport {
    fn absorb(&mut self, other: RenderReport) {
        self.written.extend(other.written);
        for svc in other.restarts {
            if !self.restarts.contains(&svc) {
                self.restarts.push(svc);
            }
        }
        self.failures.extend(other.failures);
    }

    /// Turn collected per-file failures into an error.
    pub fn into_result(self) -> Result<RenderReport> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(AgentError::Render(self.failures))
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigRegistry
// ---------------------------------------------------------------------------

/// All managed files for this invocation.
///
/// Paths are logical (`/etc/...`); `root` is prepended on disk access so the
/// whole tree can be redirected into a scratch directory.
pub struct ConfigRegistry {
    root: PathBuf,
    files: Vec<ManagedFile>,
}

impl ConfigRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ConfigRegistry {
            root: root.into(),
            files: Vec::new(),
        }
    }

    pub fn register(&mut self, file: ManagedFile) -> &mut Self {
        debug!(path = %file.path.display(), "registered managed file");
        self.files.push(file);
        self
    }

    /// Track a file this registry does not render.
    pub fn watch(&mut self, path: impl Into<PathBuf>, services: &[&str]) -> &mut Self {
        self.files.push(ManagedFile {
            path: path.into(),
            template: None,
            builders: Vec::new(),
            services: services.iter().map(|s| s.to_string()).collect(),
            requires: None,
        });
        self
    }

    pub fn files(&self) -> &[ManagedFile] {
        &self.files
    }

    /// Where a logical path lives on disk.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_under(&self.root, path)
    }

    pub fn restart_map(&self) -> ServiceRestartMap {
        let mut map = ServiceRestartMap::new();
        for file in &self.files {
            let services: Vec<&str> = file.services.iter().map(String::as_str).collect();
            map.insert(file.path.clone(), &services);
        }
        map
    }

    /// Current on-disk checksum of every file in the restart map.
    pub fn checksums(&self) -> ChecksumSnapshot {
        self.files
            .iter()
            .map(|f| (f.path.clone(), file_checksum(&self.resolve(&f.path))))
            .collect()
    }

    /// Names of every builder, across all files, that is currently complete.
    pub fn complete_contexts(&self, env: &BuildEnv) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for builder in self.files.iter().flat_map(|f| f.builders.iter()) {
            let name = builder.name();
            if !names.contains(&name) && builder.render(env).is_some() {
                names.push(name);
            }
        }
        names
    }

    /// Render one managed file.
    pub fn render_one(&self, path: &Path, env: &BuildEnv) -> Result<RenderReport> {
        let file = self
            .files
            .iter()
            .find(|f| f.path == path)
            .ok_or_else(|| {
                AgentError::InvalidArgument(format!("{} is not a managed file", path.display()))
            })?;
        self.render_file(file, env).into_result()
    }

    /// Render every managed file. A failing file does not stop the others.
    pub fn render_all(&self, env: &BuildEnv) -> Result<RenderReport> {
        let mut report = RenderReport::default();
        for file in &self.files {
            report.absorb(self.render_file(file, env));
        }
        info!(
            written = report.written.len(),
            failed = report.failures.len(),
            "rendered managed files"
        );
        report.into_result()
    }

    fn render_file(&self, file: &ManagedFile, env: &BuildEnv) -> RenderReport {
        let mut report = RenderReport::default();
        let Some(template) = file.template else {
            return report;
        };
        let (fragment, complete) = file.fragment(env);
        if let Some(required) = file.requires {
            if !complete.contains(&required) {
                debug!(path = %file.path.display(), context = required, "skipped, context incomplete");
                return report;
            }
        }

        let content = template(&fragment);
        match write_if_changed(&self.resolve(&file.path), content.as_bytes()) {
            Ok(true) => {
                info!(path = %file.path.display(), contexts = ?complete, "wrote config");
                report.written.push(file.path.clone());
                report.restarts = file.services.clone();
            }
            Ok(false) => debug!(path = %file.path.display(), "config unchanged"),
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "failed to write config");
                report.failures.push((file.path.clone(), e.to_string()));
            }
        }
        report
    }
}

pub(crate) fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(rel) => root.join(rel),
        Err(_) => root.join(path),
    }
}

/// SHA-256 hex digest of a file's bytes, or `None` if it cannot be read.
pub fn file_checksum(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(hex::encode(Sha256::digest(&bytes))),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "cannot checksum file");
            }
            None
        }
    }
}

/// Write `bytes` to `path` unless it already holds exactly them. Returns
/// whether a write happened.
fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == bytes => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(AgentError::file_access(path, e)),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AgentError::file_access(parent, e))?;
    }
    write_atomic(path, bytes)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{testenv, AmqpContext, NeutronCcContext};
    use crate::facts::{unit, FactStore};
    use crate::types::config::LocalSettings;
    use tempfile::TempDir;

    fn registry(root: &Path) -> ConfigRegistry {
        let mut reg = ConfigRegistry::new(root);
        reg.register(
            ManagedFile::new("/etc/neutron/neutron.conf", templates::neutron_conf)
                .builder(AmqpContext)
                .builder(NeutronCcContext)
                .restarts(&["neutron-server"]),
        );
        reg.register(
            ManagedFile::new("/etc/default/haproxy", templates::haproxy_default)
                .restarts(&["haproxy"]),
        );
        reg.watch("/etc/neutron/plugins/nuage/nuage_plugin.ini", &["neutron-server"]);
        reg
    }

    fn amqp_facts() -> FactStore {
        FactStore::new("neutron-api/0").with_relation(
            "amqp",
            "amqp:3",
            vec![unit("rabbitmq-server/0", &[("private-address", "10.0.0.20"), ("password", "pw")])],
        )
    }

    #[test]
    fn second_render_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let reg = registry(dir.path());
        let settings = LocalSettings::default();
        let facts = amqp_facts();
        let net = testenv::net();
        let env = BuildEnv::new(&settings, &facts, &net);

        let first = reg.render_all(&env).unwrap();
        assert_eq!(first.written.len(), 2);
        assert_eq!(first.restarts, vec!["neutron-server", "haproxy"]);

        let before = reg.checksums();
        let second = reg.render_all(&env).unwrap();
        assert!(second.written.is_empty());
        assert!(second.restarts.is_empty());
        assert_eq!(reg.checksums(), before);
    }

    #[test]
    fn new_facts_rewrite_only_affected_file() {
        let dir = TempDir::new().unwrap();
        let reg = registry(dir.path());
        let settings = LocalSettings::default();
        let net = testenv::net();
        let empty = FactStore::new("neutron-api/0");
        reg.render_all(&BuildEnv::new(&settings, &empty, &net)).unwrap();

        let facts = amqp_facts();
        let report = reg.render_all(&BuildEnv::new(&settings, &facts, &net)).unwrap();
        assert_eq!(report.written, vec![PathBuf::from("/etc/neutron/neutron.conf")]);
        let conf = fs::read_to_string(dir.path().join("etc/neutron/neutron.conf")).unwrap();
        assert!(conf.contains("rabbit_host = 10.0.0.20"));
    }

    #[test]
    fn failure_isolated_per_file() {
        let dir = TempDir::new().unwrap();
        // A regular file where a directory is expected makes one write fail.
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/neutron"), "not a directory").unwrap();

        let reg = registry(dir.path());
        let settings = LocalSettings::default();
        let facts = FactStore::new("neutron-api/0");
        let net = testenv::net();
        let err = reg
            .render_all(&BuildEnv::new(&settings, &facts, &net))
            .unwrap_err();
        match err {
            AgentError::Render(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, PathBuf::from("/etc/neutron/neutron.conf"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(dir.path().join("etc/default/haproxy").exists());
    }

    #[test]
    fn restart_map_includes_watched_files() {
        let reg = registry(Path::new("/"));
        let map = reg.restart_map();
        assert_eq!(map.len(), 3);
        assert_eq!(
            map.services_for(Path::new("/etc/neutron/plugins/nuage/nuage_plugin.ini")),
            &["neutron-server".to_string()]
        );
    }

    #[test]
    fn complete_contexts_lists_ready_builders() {
        let reg = registry(Path::new("/"));
        let settings = LocalSettings::default();
        let net = testenv::net();
        let empty = FactStore::new("neutron-api/0");
        assert_eq!(reg.complete_contexts(&BuildEnv::new(&settings, &empty, &net)), vec!["neutron-cc"]);
        let facts = amqp_facts();
        assert_eq!(
            reg.complete_contexts(&BuildEnv::new(&settings, &facts, &net)),
            vec!["amqp", "neutron-cc"]
        );
    }

    #[test]
    fn render_one_rejects_unknown_path() {
        let reg = registry(Path::new("/"));
        let settings = LocalSettings::default();
        let facts = FactStore::new("neutron-api/0");
        let net = testenv::net();
        let err = reg
            .render_one(Path::new("/etc/motd"), &BuildEnv::new(&settings, &facts, &net))
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidArgument(_)));
    }

    #[test]
    fn checksum_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(file_checksum(&dir.path().join("nope")), None);
        fs::write(dir.path().join("f"), "abc").unwrap();
        assert_eq!(
            file_checksum(&dir.path().join("f")).as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }
}
