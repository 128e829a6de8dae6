//! Nuage VSD REST endpoint from the `vsd-rest-api` relation.
//!
//! Fragment keys are the `[restproxy]` option names of the plugin file, so
//! the handler can patch them in directly.

use super::{BuildEnv, ConfigFragment, ContextBuilder};

/// Port the VSD REST API listens on.
pub const VSD_REST_PORT: u16 = 8443;

/// Every `[restproxy]` option this builder may emit.
pub const RESTPROXY_KEYS: &[&str] = &[
    "server",
    "serverauth",
    "organization",
    "base_uri",
    "auth_resource",
    "default_net_partition_name",
    "serverssl",
];

pub struct VsdContext;

impl ContextBuilder for VsdContext {
    fn name(&self) -> &'static str {
        "vsd-rest-api"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        let sets = env
            .facts
            .facts_for("vsd-rest-api", &["vsd-ip-address"])
            .complete()?;
        let ip = sets[0].text("vsd-ip-address")?;
        let s = env.settings;

        let mut frag = ConfigFragment::new().with("server", format!("{}:{}", ip, VSD_REST_PORT));
        let optional = [
            ("serverauth", &s.vsd_auth),
            ("organization", &s.vsd_organization),
            ("base_uri", &s.vsd_base_uri),
            ("auth_resource", &s.vsd_auth_resource),
            ("default_net_partition_name", &s.vsd_netpart_name),
        ];
        for (key, value) in optional {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                frag.set(key, v);
            }
        }
        if s.vsd_auth_ssl {
            frag.set("serverssl", "True");
        }
        Some(frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testenv;
    use crate::facts::{unit, FactStore};
    use crate::types::config::LocalSettings;

    #[test]
    fn requires_ip() {
        let settings = LocalSettings::default();
        let facts = FactStore::new("neutron-api/0")
            .with_relation("vsd-rest-api", "vsd-rest-api:9", vec![unit("nuage-vsd/0", &[])]);
        let net = testenv::net();
        assert_eq!(VsdContext.render(&BuildEnv::new(&settings, &facts, &net)), None);
    }

    #[test]
    fn restproxy_options() {
        let mut settings = LocalSettings::default();
        settings.vsd_auth = Some("csproot:csproot".into());
        settings.vsd_auth_ssl = true;
        settings.vsd_organization = Some("".into());
        let facts = FactStore::new("neutron-api/0").with_relation(
            "vsd-rest-api",
            "vsd-rest-api:9",
            vec![unit("nuage-vsd/0", &[("vsd-ip-address", "10.0.0.5")])],
        );
        let net = testenv::net();
        let frag = VsdContext.render(&BuildEnv::new(&settings, &facts, &net)).unwrap();
        assert_eq!(frag.text("server").as_deref(), Some("10.0.0.5:8443"));
        assert_eq!(frag.text("serverauth").as_deref(), Some("csproot:csproot"));
        assert_eq!(frag.text("serverssl").as_deref(), Some("True"));
        assert!(!frag.contains("organization"));
    }
}
