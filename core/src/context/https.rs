//! Apache TLS frontend, active when a certificate and key are configured.

use serde_json::{json, Value};

use crate::network::{format_host, resolve_address, AddressType};
use crate::packages::APACHE_SSL_DIR;

use super::{
    determine_apache_port, determine_api_port, https_enabled, BuildEnv, ConfigFragment,
    ContextBuilder, NEUTRON_SERVER_PORT,
};

pub struct HttpsContext;

impl ContextBuilder for HttpsContext {
    fn name(&self) -> &'static str {
        "https"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        if !https_enabled(env.settings) {
            return None;
        }
        let ext_port = determine_apache_port(env, NEUTRON_SERVER_PORT, true);
        let int_port = determine_api_port(env, NEUTRON_SERVER_PORT, true);

        let mut addresses: Vec<String> = AddressType::ALL
            .iter()
            .map(|t| resolve_address(env.settings, env.facts, env.net, *t))
            .collect();
        addresses.sort();
        addresses.dedup();

        let endpoints: Vec<Value> = addresses
            .iter()
            .map(|addr| json!([addr, format_host(addr), ext_port, int_port]))
            .collect();

        Some(
            ConfigFragment::new()
                .with("namespace", "neutron")
                .with("endpoints", Value::Array(endpoints))
                .with("ext_ports", vec![ext_port])
                .with("ssl_dir", APACHE_SSL_DIR)
                .with("ssl_cert", env.settings.ssl_cert.clone().unwrap_or_default())
                .with("ssl_key", env.settings.ssl_key.clone().unwrap_or_default()),
        )
    }
}
