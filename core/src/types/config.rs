use serde::{Deserialize, Serialize};

/// Network-virtualization backend the API server is configured for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NeutronPlugin {
    /// Open vSwitch through the ML2 core plugin.
    Ovs,
    /// VMware NSX.
    Nsx,
    /// Nuage VSP, driven by an external VSD controller.
    Vsp,
}

impl NeutronPlugin {
    pub fn as_str(&self) -> &'static str {
        match self {
            NeutronPlugin::Ovs => "ovs",
            NeutronPlugin::Nsx => "nsx",
            NeutronPlugin::Vsp => "vsp",
        }
    }
}

/// Operator-supplied charm options.
///
/// Keys on the wire are the charm's kebab-case option names. Every field has
/// a default so partial documents (and `config-get --format=json` output with
/// unset options) deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct LocalSettings {
    pub openstack_origin: String,
    pub neutron_plugin: NeutronPlugin,
    pub neutron_plugin_repository_url: Option<String>,
    pub vsp_packages: String,

    pub database: String,
    pub database_user: String,
    pub rabbit_user: String,
    pub rabbit_vhost: String,
    pub region: String,

    pub neutron_security_groups: bool,
    pub l2_population: bool,
    pub overlay_network_type: String,
    pub neutron_external_network: Option<String>,
    pub debug: bool,
    pub verbose: bool,

    pub prefer_ipv6: bool,
    pub os_public_network: Option<String>,
    pub os_internal_network: Option<String>,
    pub os_admin_network: Option<String>,

    pub vip: Option<String>,
    pub ha_bindiface: String,
    pub ha_mcastport: u16,

    #[serde(rename = "ssl_cert")]
    pub ssl_cert: Option<String>,
    #[serde(rename = "ssl_key")]
    pub ssl_key: Option<String>,

    pub vsd_config_file: String,
    pub vsd_auth: Option<String>,
    pub vsd_auth_ssl: bool,
    pub vsd_organization: Option<String>,
    pub vsd_base_uri: Option<String>,
    pub vsd_auth_resource: Option<String>,
    pub vsd_netpart_name: Option<String>,

    pub nsx_username: Option<String>,
    pub nsx_password: Option<String>,
    pub nsx_cluster_name: Option<String>,
    pub nsx_tz_uuid: Option<String>,
    pub nsx_l3_uuid: Option<String>,
    pub nsx_controllers: Option<String>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        crate::data::settings::default_settings()
    }
}

impl LocalSettings {
    /// Configured virtual IPs, in declaration order.
    pub fn vips(&self) -> Vec<String> {
        self.vip
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(|s| s.to_string())
            .collect()
    }

    /// Extra packages requested for the VSP plugin.
    pub fn extra_vsp_packages(&self) -> Vec<String> {
        self.vsp_packages
            .split_whitespace()
            .map(|s| s.to_string())
            .collect()
    }
}
