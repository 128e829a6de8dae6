//! Settings this unit publishes to its relations.
//!
//! Each function builds an `Advertisement` from the reconciler's inputs and
//! never publishes it; the handlers decide when and where.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::context::{https_enabled, NEUTRON_SERVER_PORT};
use crate::error::{AgentError, Result};
use crate::network::{canonical_url, is_ipv6, resolve_address, AddressType};
use crate::packages::{l2_population, overlay_network_type};
use crate::reconciler::Reconciler;
use crate::types::config::NeutronPlugin;
use crate::types::relation::Advertisement;

fn endpoint(rec: &Reconciler, addr_type: AddressType) -> String {
    let addr = resolve_address(rec.settings(), rec.facts(), rec.net(), addr_type);
    format!(
        "{}:{}",
        canonical_url(https_enabled(rec.settings()), &addr),
        NEUTRON_SERVER_PORT
    )
}

/// Keystone endpoint registration. With `trigger`, a fresh UUID forces the
/// remote side to re-run even when nothing else changed.
pub fn identity_settings(rec: &Reconciler, relation_id: Option<&str>, trigger: bool) -> Advertisement {
    let mut adv = Advertisement::new(relation_id)
        .with("quantum_service", "quantum")
        .with("quantum_region", rec.settings().region.clone())
        .with("quantum_public_url", endpoint(rec, AddressType::Public))
        .with("quantum_admin_url", endpoint(rec, AddressType::Admin))
        .with("quantum_internal_url", endpoint(rec, AddressType::Internal));
    if trigger {
        adv.set("relation_trigger", Uuid::new_v4().to_string());
    }
    adv
}

/// What nova-cloud-controller needs to reach the API.
pub fn neutron_api_settings(rec: &Reconciler, relation_id: Option<&str>) -> Advertisement {
    let s = rec.settings();
    Advertisement::new(relation_id)
        .with("neutron-url", endpoint(rec, AddressType::Internal))
        .with("neutron-plugin", s.neutron_plugin.as_str())
        .with(
            "neutron-security-groups",
            if s.neutron_security_groups { "yes" } else { "no" },
        )
}

/// Plugin settings for the compute and gateway agents.
pub fn plugin_api_settings(rec: &Reconciler, relation_id: Option<&str>) -> Result<Advertisement> {
    let s = rec.settings();
    let adv = Advertisement::new(relation_id);
    if s.neutron_plugin == NeutronPlugin::Nsx {
        let opt = |v: &Option<String>| v.clone().map_or(Value::Null, Value::String);
        return Ok(adv
            .with("nsx-username", opt(&s.nsx_username))
            .with("nsx-password", opt(&s.nsx_password))
            .with("nsx-cluster-name", opt(&s.nsx_cluster_name))
            .with("nsx-tz-uuid", opt(&s.nsx_tz_uuid))
            .with("nsx-l3-uuid", opt(&s.nsx_l3_uuid))
            .with("nsx-controllers", opt(&s.nsx_controllers)));
    }
    Ok(adv
        .with("neutron-security-groups", s.neutron_security_groups)
        .with("l2-population", l2_population(s))
        .with("overlay-network-type", overlay_network_type(s)?))
}

pub fn amqp_settings(rec: &Reconciler, relation_id: Option<&str>) -> Advertisement {
    Advertisement::new(relation_id)
        .with("username", rec.settings().rabbit_user.clone())
        .with("vhost", rec.settings().rabbit_vhost.clone())
}

/// Per-network addresses for peers. Empty when no subnet is configured and
/// IPv6 is not preferred.
pub fn cluster_settings(rec: &Reconciler, relation_id: Option<&str>) -> Result<Advertisement> {
    let mut adv = Advertisement::new(relation_id);
    for addr_type in AddressType::ALL {
        let addr = addr_type
            .configured_network(rec.settings())
            .and_then(|cidr| rec.net().address_in_network(cidr));
        if let Some(addr) = addr {
            adv.set(&format!("{}-address", addr_type.as_str()), addr.to_string());
        }
    }
    if rec.settings().prefer_ipv6 {
        let addr = rec
            .net()
            .ipv6_addresses(&rec.settings().vips())
            .into_iter()
            .next()
            .ok_or_else(no_ipv6)?;
        adv.set("private-address", addr);
    }
    Ok(adv)
}

pub(crate) fn no_ipv6() -> AgentError {
    AgentError::Settings("prefer-ipv6 is set but this unit has no global IPv6 address".into())
}

/// Database access request. Under IPv6 every local address may connect, so
/// the full list goes out as JSON.
pub fn shared_db_settings(rec: &Reconciler, relation_id: Option<&str>) -> Result<Advertisement> {
    let s = rec.settings();
    let adv = Advertisement::new(relation_id)
        .with("database", s.database.clone())
        .with("username", s.database_user.clone());
    if !s.prefer_ipv6 {
        return Ok(adv.with("hostname", rec.net().private_address.clone()));
    }

    let mut hosts = rec.net().ipv6_addresses(&[]);
    for vip in s.vips().into_iter().filter(|v| is_ipv6(v)) {
        if !hosts.contains(&vip) {
            hosts.push(vip);
        }
    }
    if hosts.is_empty() {
        return Err(no_ipv6());
    }
    let hostname = serde_json::to_string(&hosts)
        .map_err(|e| AgentError::InvalidArgument(format!("cannot encode hostnames: {}", e)))?;
    Ok(adv.with("hostname", hostname))
}

/// Pacemaker resources for the VIPs and haproxy.
///
/// Returns the group advertisement (absent when no VIP could be placed on a
/// local interface) and the main resource advertisement.
pub fn ha_settings(rec: &Reconciler, relation_id: Option<&str>) -> Result<(Option<Advertisement>, Advertisement)> {
    let s = rec.settings();
    let vips = s.vips();
    if vips.is_empty() {
        return Err(AgentError::Settings(
            "insufficient config data to configure hacluster: vip".into(),
        ));
    }

    let mut resources: BTreeMap<String, String> = BTreeMap::new();
    let mut resource_params: BTreeMap<String, String> = BTreeMap::new();
    resources.insert("res_neutron_haproxy".into(), "lsb:haproxy".into());
    resource_params.insert("res_neutron_haproxy".into(), "op monitor interval=\"5s\"".into());

    let mut vip_group: Vec<String> = Vec::new();
    for vip in &vips {
        let Ok(addr) = vip.parse::<IpAddr>() else {
            warn!(vip = %vip, "skipping unparseable vip");
            continue;
        };
        let (agent, param) = if addr.is_ipv6() {
            ("ocf:heartbeat:IPv6addr", "ipv6addr")
        } else {
            ("ocf:heartbeat:IPaddr2", "ip")
        };
        let (Some(iface), Some(netmask)) = (
            rec.net().iface_for_address(&addr),
            rec.net().netmask_for_address(&addr),
        ) else {
            warn!(vip = %vip, "no local interface in the vip's subnet");
            continue;
        };

        let mut key = format!("res_neutron_{}_vip", iface);
        if vip_group.contains(&key) {
            key = format!("{}_{}", key, param);
        }
        resources.insert(key.clone(), agent.into());
        resource_params.insert(
            key.clone(),
            format!(
                "params {}=\"{}\" cidr_netmask=\"{}\" nic=\"{}\"",
                param, vip, netmask, iface
            ),
        );
        vip_group.push(key);
    }

    let groups = (!vip_group.is_empty()).then(|| {
        let mut group = BTreeMap::new();
        group.insert("grp_neutron_vips".to_string(), vip_group.join(" "));
        Advertisement::new(relation_id).with("groups", to_value(group))
    });

    let mut init_services = BTreeMap::new();
    init_services.insert("res_neutron_haproxy".to_string(), "haproxy".to_string());
    let mut clones = BTreeMap::new();
    clones.insert("cl_nova_haproxy".to_string(), "res_neutron_haproxy".to_string());

    let main = Advertisement::new(relation_id)
        .with("init_services", to_value(init_services))
        .with("corosync_bindiface", s.ha_bindiface.clone())
        .with("corosync_mcastport", s.ha_mcastport)
        .with("resources", to_value(resources))
        .with("resource_params", to_value(resource_params))
        .with("clones", to_value(clones));
    Ok((groups, main))
}

fn to_value(map: BTreeMap<String, String>) -> Value {
    Value::Object(map.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
}
