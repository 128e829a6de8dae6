//! Parse `ip -o addr show` output into interface addresses.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// One address bound to a local interface, with its prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub iface: String,
    pub net: IpNet,
    /// False for link-local and host-scoped addresses.
    #[serde(default = "default_global")]
    pub global: bool,
}

fn default_global() -> bool {
    true
}

impl InterfaceAddr {
    pub fn new(iface: &str, cidr: &str) -> Result<Self, String> {
        let net: IpNet = cidr
            .parse()
            .map_err(|e| format!("bad address '{}': {}", cidr, e))?;
        Ok(InterfaceAddr {
            iface: iface.to_string(),
            global: !is_link_local(&net.addr()),
            net,
        })
    }

    pub fn addr(&self) -> IpAddr {
        self.net.addr()
    }
}

fn is_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Parse the one-line-per-address form of `ip addr`.
///
/// ```text
/// 2: eth0    inet 10.5.0.12/16 brd 10.5.255.255 scope global eth0\       valid_lft ...
/// 2: eth0    inet6 fe80::f816:3eff:fe1c:1/64 scope link \       valid_lft ...
/// ```
pub fn parse_ip_addr_output(output: &str) -> Vec<InterfaceAddr> {
    let mut addrs = Vec::new();
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            continue;
        }
        let iface = tokens[1]
            .trim_end_matches(':')
            .split('@')
            .next()
            .unwrap_or_default();
        let family = match tokens.iter().position(|t| *t == "inet" || *t == "inet6") {
            Some(pos) => pos,
            None => continue,
        };
        let Some(cidr) = tokens.get(family + 1) else {
            continue;
        };
        let Ok(mut entry) = InterfaceAddr::new(iface, cidr) else {
            continue;
        };
        if let Some(scope) = tokens.iter().position(|t| *t == "scope") {
            if let Some(value) = tokens.get(scope + 1) {
                entry.global = *value == "global";
            }
        }
        addrs.push(entry);
    }
    addrs
}
