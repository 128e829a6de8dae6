use std::path::Path;

use crate::error::{AgentError, Result};
use crate::types::config::{LocalSettings, NeutronPlugin};


/// Returns the charm's documented defaults for every option.
pub fn default_settings() -> LocalSettings {
    LocalSettings {
        openstack_origin: "distro".into(),
        neutron_plugin: NeutronPlugin::Ovs,
        neutron_plugin_repository_url: None,
        vsp_packages: String::new(),
        database: "neutron".into(),
        database_user: "neutron".into(),
        rabbit_user: "neutron".into(),
        rabbit_vhost: "openstack".into(),
        region: "RegionOne".into(),
        neutron_security_groups: false,
        l2_population: true,
        overlay_network_type: "gre".into(),
        neutron_external_network: Some("ext_net".into()),
        debug: false,
        verbose: false,
        prefer_ipv6: false,
        os_public_network: None,
        os_internal_network: None,
        os_admin_network: None,
        vip: None,
        ha_bindiface: "eth0".into(),
        ha_mcastport: 5404,
        ssl_cert: None,
        ssl_key: None,
        vsd_config_file: "/etc/neutron/plugins/nuage/nuage_plugin.ini".into(),
        vsd_auth: None,
        vsd_auth_ssl: false,
        vsd_organization: None,
        vsd_base_uri: None,
        vsd_auth_resource: None,
        vsd_netpart_name: None,
        nsx_username: None,
        nsx_password: None,
        nsx_cluster_name: None,
        nsx_tz_uuid: None,
        nsx_l3_uuid: None,
        nsx_controllers: None,
    }
}


/// Load settings from a YAML (or JSON) document on disk.
pub fn load(path: &Path) -> Result<LocalSettings> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AgentError::file_access(path, e))?;
    parse(&content)
}


/// Parse settings from YAML. JSON is accepted too since `config-get
/// --format=json` output is valid YAML.
///
/// Unset options arrive as `null`; those keys are dropped so the field
/// default applies.
pub fn parse(content: &str) -> Result<LocalSettings> {
    if content.trim().is_empty() {
        return Ok(default_settings());
    }
    let mut doc: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| AgentError::Settings(format!("parse error: {}", e)))?;
    if let serde_yaml::Value::Mapping(map) = &mut doc {
        map.retain(|_, v| !v.is_null());
    }
    let settings: LocalSettings = serde_yaml::from_value(doc)
        .map_err(|e| AgentError::Settings(e.to_string()))?;
    validate(&settings)?;
    Ok(settings)
}


/// Serialize settings back to YAML.
pub fn serialize(settings: &LocalSettings) -> Result<String> {
    serde_yaml::to_string(settings).map_err(|e| AgentError::Settings(e.to_string()))
}


fn validate(settings: &LocalSettings) -> Result<()> {
    for (opt, value) in [
        ("os-public-network", &settings.os_public_network),
        ("os-internal-network", &settings.os_internal_network),
        ("os-admin-network", &settings.os_admin_network),
    ] {
        if let Some(cidr) = value {
            cidr.parse::<ipnet::IpNet>().map_err(|e| {
                AgentError::Settings(format!("{} '{}' is not a CIDR: {}", opt, cidr, e))
            })?;
        }
    }
    for vip in settings.vips() {
        vip.parse::<std::net::IpAddr>()
            .map_err(|e| AgentError::Settings(format!("vip '{}': {}", vip, e)))?;
    }
    Ok(())
}
