//! Core neutron-server settings. Always complete.

use serde_json::Value;
use tracing::warn;

use crate::packages::{l2_population, overlay_network_type, plugin_attrs};
use crate::types::config::NeutronPlugin;

use super::{determine_api_port, BuildEnv, ConfigFragment, ContextBuilder, NEUTRON_SERVER_PORT};

pub struct NeutronCcContext;

impl ContextBuilder for NeutronCcContext {
    fn name(&self) -> &'static str {
        "neutron-cc"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        let s = env.settings;
        let attrs = plugin_attrs(s.neutron_plugin);

        let mut frag = ConfigFragment::new()
            .with("debug", s.debug)
            .with("verbose", s.verbose)
            .with("network_manager", "neutron")
            .with("neutron_plugin", s.neutron_plugin.as_str())
            .with("core_plugin", attrs.driver)
            .with("plugin_config", attrs.config)
            .with("neutron_security_groups", s.neutron_security_groups)
            .with("l2_population", l2_population(s))
            .with(
                "neutron_bind_port",
                determine_api_port(env, NEUTRON_SERVER_PORT, true),
            );

        match overlay_network_type(s) {
            Ok(types) => {
                frag.set("overlay_network_type", types);
            }
            Err(e) => warn!(error = %e, "ignoring overlay-network-type"),
        }
        if let Some(ext) = s.neutron_external_network.as_deref().filter(|n| !n.is_empty()) {
            frag.set("external_network", ext);
        }

        let nova_url = env
            .facts
            .relation_ids("neutron-api")
            .iter()
            .flat_map(|rid| {
                env.facts
                    .related_units(rid)
                    .into_iter()
                    .map(move |u| (rid.clone(), u))
            })
            .find_map(|(rid, u)| env.facts.get(&rid, &u, "nova_url"));
        if let Some(url) = nova_url {
            frag.set("nova_url", url);
        }

        if s.neutron_plugin == NeutronPlugin::Nsx {
            for (key, value) in [
                ("nsx_username", &s.nsx_username),
                ("nsx_password", &s.nsx_password),
                ("nsx_tz_uuid", &s.nsx_tz_uuid),
                ("nsx_l3_uuid", &s.nsx_l3_uuid),
                ("nsx_cluster_name", &s.nsx_cluster_name),
            ] {
                frag.set(key, value.clone().map_or(Value::Null, Value::String));
            }
            let controllers = s
                .nsx_controllers
                .as_deref()
                .unwrap_or("")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(",");
            frag.set("nsx_controllers", controllers);
        }
        Some(frag)
    }
}
