//! Address selection for advertised endpoints.
//!
//! Every endpoint this unit publishes is resolved per `AddressType`. The
//! operator can pin each type to a subnet (`os-<type>-network`); an address
//! of the unit inside that subnet wins, otherwise the unit's primary address
//! is used. Once the service is clustered, the VIPs take over.

pub mod interfaces;

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::facts::FactStore;
use crate::infrastructure::HostBackend;
use crate::types::config::LocalSettings;

pub use interfaces::{parse_ip_addr_output, InterfaceAddr};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Public,
    Internal,
    Admin,
}

impl AddressType {
    pub const ALL: [AddressType; 3] = [AddressType::Public, AddressType::Internal, AddressType::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Public => "public",
            AddressType::Internal => "internal",
            AddressType::Admin => "admin",
        }
    }

    /// The operator-configured subnet for this address type, if any.
    pub fn configured_network<'a>(&self, settings: &'a LocalSettings) -> Option<&'a str> {
        match self {
            AddressType::Public => settings.os_public_network.as_deref(),
            AddressType::Internal => settings.os_internal_network.as_deref(),
            AddressType::Admin => settings.os_admin_network.as_deref(),
        }
    }
}

/// Local addressing captured once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetworkInfo {
    pub private_address: String,
    #[serde(default)]
    pub interfaces: Vec<InterfaceAddr>,
}

impl NetworkInfo {
    pub fn new(private_address: &str, interfaces: Vec<InterfaceAddr>) -> Self {
        NetworkInfo {
            private_address: private_address.to_string(),
            interfaces,
        }
    }

    pub fn gather(host: &dyn HostBackend) -> Result<Self> {
        let private_address = host.private_address().map_err(|e| AgentError::Host {
            action: "unit-get private-address".into(),
            message: e,
        })?;
        let interfaces = host.interfaces().map_err(|e| AgentError::Host {
            action: "ip addr".into(),
            message: e,
        })?;
        Ok(NetworkInfo::new(private_address.trim(), interfaces))
    }

    /// First local address inside `cidr`.
    pub fn address_in_network(&self, cidr: &str) -> Option<IpAddr> {
        let net: IpNet = cidr.parse().ok()?;
        self.interfaces
            .iter()
            .map(|i| i.addr())
            .find(|addr| net.contains(addr))
    }

    /// The interface whose subnet contains `addr`. The address need not be
    /// bound locally.
    pub fn interface_for(&self, addr: &IpAddr) -> Option<&InterfaceAddr> {
        self.interfaces
            .iter()
            .filter(|i| i.global || i.addr() == *addr)
            .find(|i| i.net.trunc().contains(addr))
    }

    pub fn iface_for_address(&self, addr: &IpAddr) -> Option<String> {
        self.interface_for(addr).map(|i| i.iface.clone())
    }

    /// Netmask of the subnet containing `addr`. IPv6 reports the prefix length.
    pub fn netmask_for_address(&self, addr: &IpAddr) -> Option<String> {
        self.interface_for(addr).map(|i| match i.net {
            IpNet::V4(v4) => v4.netmask().to_string(),
            IpNet::V6(v6) => v6.prefix_len().to_string(),
        })
    }

    /// Global IPv6 addresses of the unit, excluding any in `exclude`.
    pub fn ipv6_addresses(&self, exclude: &[String]) -> Vec<String> {
        self.interfaces
            .iter()
            .filter(|i| i.global && i.addr().is_ipv6())
            .map(|i| i.addr().to_string())
            .filter(|a| !exclude.contains(a))
            .collect()
    }
}

/// Wrap an IPv6 literal in brackets for use inside a URL or host:port.
pub fn format_host(addr: &str) -> String {
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V6(_)) => format!("[{}]", addr),
        _ => addr.to_string(),
    }
}

pub fn is_ipv6(addr: &str) -> bool {
    matches!(addr.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
}

/// Resolve the address to advertise for `addr_type`.
pub fn resolve_address(
    settings: &LocalSettings,
    facts: &FactStore,
    net: &NetworkInfo,
    addr_type: AddressType,
) -> String {
    let subnet = addr_type.configured_network(settings);
    let vips = settings.vips();

    if facts.is_clustered() && !vips.is_empty() {
        if let Some(cidr) = subnet.and_then(|s| s.parse::<IpNet>().ok()) {
            let in_net = vips
                .iter()
                .find(|v| v.parse::<IpAddr>().map_or(false, |a| cidr.contains(&a)));
            if let Some(vip) = in_net {
                return vip.clone();
            }
        }
        return vips[0].clone();
    }

    if settings.prefer_ipv6 {
        if let Some(addr) = net.ipv6_addresses(&vips).into_iter().next() {
            return addr;
        }
    }

    subnet
        .and_then(|cidr| net.address_in_network(cidr))
        .map(|a| a.to_string())
        .unwrap_or_else(|| net.private_address.clone())
}

/// `scheme://host` for an endpoint, without a port.
pub fn canonical_url(https: bool, address: &str) -> String {
    let scheme = if https { "https" } else { "http" };
    format!("{}://{}", scheme, format_host(address))
}
