//! Database connection contexts for MySQL (`shared-db`) and PostgreSQL
//! (`pgsql-db`).

use tracing::info;

use crate::facts::FactLookup;
use crate::network::format_host;

use super::{text_list, BuildEnv, ConfigFragment, ContextBuilder};

/// MySQL via the `shared-db` relation.
///
/// With `prefer-ipv6` each database unit answers with its own `db_host`; all
/// of them are kept, bracketed, in relation order.
pub struct SharedDbContext;

impl ContextBuilder for SharedDbContext {
    fn name(&self) -> &'static str {
        "shared-db"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        let sets = match env.facts.facts_for("shared-db", &["db_host", "password"]) {
            FactLookup::Complete(sets) => sets,
            FactLookup::Incomplete { reason, .. } => {
                info!(?reason, "shared-db relation incomplete. Peer not ready?");
                return None;
            }
        };
        let first = &sets[0];

        let mut frag = ConfigFragment::new()
            .with("database_host", format_host(&first.text("db_host")?))
            .with("database", env.settings.database.clone())
            .with("database_user", env.settings.database_user.clone())
            .with("database_password", first.text("password")?)
            .with("database_type", "mysql");

        if env.settings.prefer_ipv6 {
            let mut hosts: Vec<String> = Vec::new();
            for host in sets.iter().filter_map(|s| s.text("db_host")) {
                let host = format_host(&host);
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
            frag.set("database_hosts", text_list(&hosts));
        }
        if let Some(ca) = first.text("ssl_ca") {
            frag.set("database_ssl_ca", ca);
        }
        Some(frag)
    }
}

/// PostgreSQL via the `pgsql-db` relation.
pub struct PostgresqlDbContext;

impl ContextBuilder for PostgresqlDbContext {
    fn name(&self) -> &'static str {
        "pgsql-db"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        let sets = env
            .facts
            .facts_for("pgsql-db", &["host", "user", "password"])
            .complete()?;
        let first = &sets[0];
        Some(
            ConfigFragment::new()
                .with("database_host", format_host(&first.text("host")?))
                .with(
                    "database",
                    first.text("database").unwrap_or_else(|| env.settings.database.clone()),
                )
                .with("database_user", first.text("user")?)
                .with("database_password", first.text("password")?)
                .with("database_type", "postgresql"),
        )
    }
}
