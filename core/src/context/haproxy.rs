//! Load-balancer backends: this unit plus every `cluster` peer.

use serde_json::{Map, Value};

use crate::network::{resolve_address, AddressType};

use super::{determine_apache_port, determine_api_port, BuildEnv, ConfigFragment, ContextBuilder, NEUTRON_SERVER_PORT};

pub struct HaproxyContext;

/// `neutron-api/1` -> `neutron-api-1`; haproxy server names cannot hold `/`.
fn server_name(unit: &str) -> String {
    unit.replace('/', "-")
}

impl ContextBuilder for HaproxyContext {
    fn name(&self) -> &'static str {
        "haproxy"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        let internal_net = env.settings.os_internal_network.is_some();
        let mut units = Map::new();
        units.insert(
            server_name(env.facts.local_unit()),
            Value::String(local_backend_address(env)),
        );

        for rid in env.facts.relation_ids("cluster") {
            for peer in env.facts.related_units(&rid) {
                let addr = internal_net
                    .then(|| env.facts.get(&rid, &peer, "internal-address"))
                    .flatten()
                    .or_else(|| env.facts.get(&rid, &peer, "private-address"));
                if let Some(addr) = addr {
                    units.insert(server_name(&peer), Value::String(addr));
                }
            }
        }
        if units.len() < 2 {
            return None;
        }

        let mut service_ports = Map::new();
        service_ports.insert(
            "neutron-server".into(),
            Value::from(vec![
                NEUTRON_SERVER_PORT,
                determine_apache_port(env, NEUTRON_SERVER_PORT, true),
            ]),
        );

        Some(
            ConfigFragment::new()
                .with("units", Value::Object(units))
                .with("service_ports", Value::Object(service_ports))
                .with("neutron_bind_port", determine_api_port(env, NEUTRON_SERVER_PORT, true))
                .with("haproxy_ipv6", env.settings.prefer_ipv6),
        )
    }
}

/// This unit's own backend address. VIPs are never a backend.
fn local_backend_address(env: &BuildEnv) -> String {
    if env.facts.is_clustered() {
        return env
            .settings
            .os_internal_network
            .as_deref()
            .and_then(|cidr| env.net.address_in_network(cidr))
            .map(|a| a.to_string())
            .unwrap_or_else(|| env.net.private_address.clone());
    }
    resolve_address(env.settings, env.facts, env.net, AddressType::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{unit, FactStore};
    use crate::network::{InterfaceAddr, NetworkInfo};
    use crate::types::config::LocalSettings;
    use serde_json::json;

    #[test]
    fn no_peers_is_none() {
        let settings = LocalSettings::default();
        let facts = FactStore::new("neutron-api/1");
        let net = NetworkInfo::new("10.10.10.11", vec![]);
        assert_eq!(HaproxyContext.render(&BuildEnv::new(&settings, &facts, &net)), None);
    }

    #[test]
    fn peers_and_ports() {
        let settings = LocalSettings::default();
        let facts = FactStore::new("neutron-api/1").with_relation(
            "cluster",
            "cluster:1",
            vec![unit("neutron-api/0", &[("private-address", "10.10.10.10")])],
        );
        let net = NetworkInfo::new(
            "10.10.10.11",
            vec![InterfaceAddr::new("eth0", "10.10.10.11/24").unwrap()],
        );
        let frag = HaproxyContext
            .render(&BuildEnv::new(&settings, &facts, &net))
            .unwrap();
        assert_eq!(
            frag.get("units"),
            Some(&json!({"neutron-api-0": "10.10.10.10", "neutron-api-1": "10.10.10.11"}))
        );
        assert_eq!(frag.get("service_ports"), Some(&json!({"neutron-server": [9696, 9686]})));
        assert_eq!(frag.text("neutron_bind_port").as_deref(), Some("9686"));
    }

    #[test]
    fn peer_without_address_skipped() {
        let settings = LocalSettings::default();
        let facts = FactStore::new("neutron-api/1")
            .with_relation("cluster", "cluster:1", vec![unit("neutron-api/0", &[])]);
        let net = NetworkInfo::new("10.10.10.11", vec![]);
        assert_eq!(HaproxyContext.render(&BuildEnv::new(&settings, &facts, &net)), None);
    }
}
