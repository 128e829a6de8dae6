//! Package, port and per-plugin attribute tables.

use crate::error::{AgentError, Result};
use crate::infrastructure::HostBackend;
use crate::types::config::{LocalSettings, NeutronPlugin};

use crate::context::NEUTRON_SERVER_PORT;

pub const NEUTRON_CONF: &str = "/etc/neutron/neutron.conf";
pub const NEUTRON_DEFAULT: &str = "/etc/default/neutron-server";
pub const HAPROXY_CONF: &str = "/etc/haproxy/haproxy.cfg";
pub const HAPROXY_DEFAULT: &str = "/etc/default/haproxy";
pub const APACHE_SITE: &str = "openstack_https_frontend";
pub const APACHE_SITE_CONF: &str = "/etc/apache2/sites-available/openstack_https_frontend.conf";
pub const APACHE_SSL_DIR: &str = "/etc/apache2/ssl/neutron";

const BASE_PACKAGES: &[&str] = &[
    "neutron-server",
    "python-keystoneclient",
    "python-mysqldb",
    "python-psycopg2",
    "python-six",
    "uuid",
    "haproxy",
    "apache2",
];

const OVERLAY_NETWORK_TYPES: &[&str] = &["gre", "vxlan"];

/// Static facts about a core plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginAttrs {
    /// Plugin configuration file read by neutron-server.
    pub config: &'static str,
    /// Python class path loaded as `core_plugin`.
    pub driver: &'static str,
    pub server_packages: &'static [&'static str],
    /// Whether the file at `config` is owned by this agent. Unowned files are
    /// only patched and watched.
    pub rendered: bool,
}

pub fn plugin_attrs(plugin: NeutronPlugin) -> PluginAttrs {
    match plugin {
        NeutronPlugin::Ovs => PluginAttrs {
            config: "/etc/neutron/plugins/ml2/ml2_conf.ini",
            driver: "neutron.plugins.ml2.plugin.Ml2Plugin",
            server_packages: &["neutron-plugin-ml2"],
            rendered: true,
        },
        NeutronPlugin::Nsx => PluginAttrs {
            config: "/etc/neutron/plugins/vmware/nsx.ini",
            driver: "neutron.plugins.vmware.plugin.NsxPlugin",
            server_packages: &["neutron-plugin-vmware"],
            rendered: true,
        },
        NeutronPlugin::Vsp => PluginAttrs {
            config: "/etc/neutron/plugins/nuage/nuage_plugin.ini",
            driver: "neutron.plugins.nuage.plugin.NuagePlugin",
            server_packages: &["neutron-plugin-nuage"],
            rendered: false,
        },
    }
}

/// Every package this unit needs for the configured plugin.
pub fn determine_packages(settings: &LocalSettings) -> Vec<String> {
    let mut packages: Vec<String> = BASE_PACKAGES.iter().map(|p| p.to_string()).collect();
    for pkg in plugin_attrs(settings.neutron_plugin).server_packages {
        packages.push(pkg.to_string());
    }
    if settings.neutron_plugin == NeutronPlugin::Vsp {
        for pkg in settings.extra_vsp_packages() {
            if !packages.contains(&pkg) {
                packages.push(pkg);
            }
        }
    }
    packages
}

pub fn determine_ports() -> Vec<u16> {
    vec![NEUTRON_SERVER_PORT]
}

/// Packages from `determine_packages` not yet installed on the host.
pub fn filter_installed(host: &dyn HostBackend, packages: &[String]) -> Result<Vec<String>> {
    host.missing_packages(packages).map_err(|e| AgentError::Host {
        action: "dpkg-query".into(),
        message: e,
    })
}

/// Validated, comma-joined overlay network types.
pub fn overlay_network_type(settings: &LocalSettings) -> Result<String> {
    let types: Vec<&str> = settings.overlay_network_type.split_whitespace().collect();
    for t in &types {
        if !OVERLAY_NETWORK_TYPES.contains(t) {
            return Err(AgentError::InvalidArgument(format!(
                "unsupported overlay-network-type '{}' (expected one of: {})",
                t,
                OVERLAY_NETWORK_TYPES.join(", ")
            )));
        }
    }
    Ok(types.join(","))
}

/// L2 population only applies to the OVS plugin.
pub fn l2_population(settings: &LocalSettings) -> bool {
    settings.neutron_plugin == NeutronPlugin::Ovs && settings.l2_population
}
