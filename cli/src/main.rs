//! neutron-api-hook: runs one lifecycle hook of the neutron-api service.
//!
//! # Usage
//!
//! ```text
//! neutron-api-hook config-changed
//! neutron-api-hook shared-db-relation-changed --relation-id shared-db:3 --remote-unit mysql/0
//! hooks/install            # symlinked; the hook name comes from argv[0]
//! ```
//!
//! Hook context falls back to the `JUJU_*` environment. Log verbosity is
//! read from `NEUTRON_API_HOOK_LOG` (an `EnvFilter` directive, default
//! `info`).

mod lock;

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use neutron_api_agent_core::data::settings;
use neutron_api_agent_core::facts::FactStore;
use neutron_api_agent_core::hooks::{register_hooks, DispatchOutcome, RELATIONS};
use neutron_api_agent_core::infrastructure::command::CommandHost;
use neutron_api_agent_core::infrastructure::runner::{CommandRunner, ShellRunner};
use neutron_api_agent_core::network::NetworkInfo;
use neutron_api_agent_core::reconciler::Reconciler;
use neutron_api_agent_core::types::config::LocalSettings;
use neutron_api_agent_core::types::event::Event;

const LOG_ENV: &str = "NEUTRON_API_HOOK_LOG";

#[derive(Parser, Debug)]
#[command(name = "neutron-api-hook", version, about = "Run a neutron-api lifecycle hook")]
struct Args {
    /// Hook to run. Defaults to the name this binary was invoked as.
    hook: Option<String>,

    /// Charm directory; the hook lock lives here.
    #[arg(long, env = "CHARM_DIR", default_value = ".")]
    charm_dir: PathBuf,

    /// Settings file (YAML or JSON). Without it, `config-get` is asked.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Relation facts as JSON. Without it, facts are gathered with the hook tools.
    #[arg(long)]
    facts: Option<PathBuf>,

    /// Filesystem root managed files are written under.
    #[arg(long, default_value = "/")]
    root: PathBuf,

    #[arg(long, env = "JUJU_RELATION_ID")]
    relation_id: Option<String>,

    #[arg(long, env = "JUJU_REMOTE_UNIT")]
    remote_unit: Option<String>,

    #[arg(long, env = "JUJU_UNIT_NAME", default_value = "")]
    unit: String,

    /// How long to wait for another hook to finish, in milliseconds.
    #[arg(long, default_value_t = 300_000)]
    lock_timeout_ms: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let Some(hook) = args.hook.clone().or_else(invoked_as) else {
        eprintln!("neutron-api-hook: no hook name given");
        process::exit(2);
    };

    if let Err(e) = run(&args, &hook) {
        error!(hook = %hook, "{}", e);
        eprintln!("neutron-api-hook: {}", e);
        process::exit(1);
    }
}

/// Hook name from argv[0] when the binary is symlinked into `hooks/`.
fn invoked_as() -> Option<String> {
    let argv0 = std::env::args().next()?;
    let name = Path::new(&argv0).file_name()?.to_str()?.to_string();
    (name != "neutron-api-hook").then_some(name)
}

fn run(args: &Args, hook: &str) -> Result<(), String> {
    let _lock = lock::acquire(&args.charm_dir.join(lock::LOCK_FILE), args.lock_timeout_ms)?;

    let local = load_settings(args.settings.as_deref())?;
    let host = CommandHost::new(Box::new(ShellRunner), &args.unit);
    let facts = match &args.facts {
        Some(path) => FactStore::load(path),
        None => FactStore::gather(&host, RELATIONS),
    }
    .map_err(|e| e.to_string())?;
    let net = NetworkInfo::gather(&host).map_err(|e| e.to_string())?;

    let event = match &args.relation_id {
        Some(rid) => Event::on_relation(hook, rid, args.remote_unit.as_deref()),
        None => Event::new(hook),
    };

    let registry = register_hooks().map_err(|e| e.to_string())?;
    let mut rec = Reconciler::new(local, facts, net, Box::new(host), &args.root);
    match registry.dispatch(&mut rec, &event).map_err(|e| e.to_string())? {
        DispatchOutcome::Handled { restarts } => {
            let journal = rec.journal();
            info!(
                hook,
                written = journal.written.len(),
                patched = journal.patched.len(),
                published = journal.published().len(),
                restarts = restarts.len(),
                "hook complete"
            );
        }
        DispatchOutcome::Unregistered => {}
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<LocalSettings, String> {
    match path {
        Some(path) => settings::load(path).map_err(|e| e.to_string()),
        None => {
            let json = ShellRunner
                .run("config-get --format=json")
                .map_err(|e| format!("config-get: {}", e))?;
            settings::parse(&json).map_err(|e| e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_hook_and_relation_context() {
        let args = Args::try_parse_from([
            "neutron-api-hook",
            "amqp-relation-changed",
            "--relation-id",
            "amqp:4",
            "--remote-unit",
            "rabbitmq-server/0",
            "--unit",
            "neutron-api/0",
        ])
        .unwrap();
        assert_eq!(args.hook.as_deref(), Some("amqp-relation-changed"));
        assert_eq!(args.relation_id.as_deref(), Some("amqp:4"));
        assert_eq!(args.root, PathBuf::from("/"));
    }

    #[test]
    fn settings_file_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "region: region457\nneutron-plugin: nsx\n").unwrap();
        let s = load_settings(Some(&path)).unwrap();
        assert_eq!(s.region, "region457");
        assert_eq!(s.neutron_plugin.as_str(), "nsx");
    }
}
