//! Keystone credentials from the `identity-service` relation.

use tracing::info;

use crate::facts::FactLookup;
use crate::network::format_host;

use super::{BuildEnv, ConfigFragment, ContextBuilder};

const REQUIRED: &[&str] = &[
    "service_host",
    "service_port",
    "auth_host",
    "auth_port",
    "service_tenant",
    "service_username",
    "service_password",
];

pub struct IdentityServiceContext;

impl ContextBuilder for IdentityServiceContext {
    fn name(&self) -> &'static str {
        "identity-service"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        let sets = match env.facts.facts_for("identity-service", REQUIRED) {
            FactLookup::Complete(sets) => sets,
            FactLookup::Incomplete { reason, .. } => {
                info!(?reason, "identity-service relation incomplete. Peer not ready?");
                return None;
            }
        };
        let ks = &sets[0];
        let protocol = |key| ks.text(key).unwrap_or_else(|| "http".to_string());

        Some(
            ConfigFragment::new()
                .with("service_host", format_host(&ks.text("service_host")?))
                .with("service_port", ks.text("service_port")?)
                .with("auth_host", format_host(&ks.text("auth_host")?))
                .with("auth_port", ks.text("auth_port")?)
                .with("admin_tenant_name", ks.text("service_tenant")?)
                .with("admin_user", ks.text("service_username")?)
                .with("admin_password", ks.text("service_password")?)
                .with("service_protocol", protocol("service_protocol"))
                .with("auth_protocol", protocol("auth_protocol"))
                .with("region", env.settings.region.clone()),
        )
    }
}
