//! Text templates for every managed file.
//!
//! A template is a plain function of the merged fragment. Sections whose
//! context is incomplete are left out; nothing here can fail.

use serde_json::Value;

use crate::context::ConfigFragment;

/// Signature every template shares.
pub type Template = fn(&ConfigFragment) -> String;

const HEADER: &str = "\
###############################################################################
# [ WARNING ]
# configuration file maintained by neutron-api-hook
# local changes may be overwritten.
###############################################################################
";

fn text(ctx: &ConfigFragment, key: &str) -> String {
    ctx.text(key).unwrap_or_default()
}

fn py_bool(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}

fn push_kv(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(" = ");
    out.push_str(value);
    out.push('\n');
}

fn push_opt(out: &mut String, ctx: &ConfigFragment, key: &str, ctx_key: &str) {
    if let Some(v) = ctx.text(ctx_key) {
        push_kv(out, key, &v);
    }
}

/// `/etc/neutron/neutron.conf`
pub fn neutron_conf(ctx: &ConfigFragment) -> String {
    let mut out = String::from(HEADER);

    out.push_str("[DEFAULT]\n");
    push_kv(&mut out, "verbose", py_bool(ctx.flag("verbose")));
    push_kv(&mut out, "debug", py_bool(ctx.flag("debug")));
    push_kv(&mut out, "lock_path", "/var/lock/neutron");
    push_kv(&mut out, "api_paste_config", "/etc/neutron/api-paste.ini");
    push_kv(&mut out, "auth_strategy", "keystone");
    push_kv(&mut out, "core_plugin", &text(ctx, "core_plugin"));
    if ctx.text("neutron_plugin").as_deref() == Some("ovs") {
        push_kv(&mut out, "service_plugins", "router,firewall,lbaas,vpnaas,metering");
    }
    push_kv(&mut out, "bind_host", "0.0.0.0");
    push_kv(&mut out, "bind_port", &text(ctx, "neutron_bind_port"));
    push_kv(&mut out, "allow_overlapping_ips", "True");
    push_opt(&mut out, ctx, "default_external_network", "external_network");

    if let Some(nova_url) = ctx.text("nova_url") {
        out.push('\n');
        push_kv(&mut out, "notify_nova_on_port_status_changes", "True");
        push_kv(&mut out, "notify_nova_on_port_data_changes", "True");
        push_kv(&mut out, "nova_url", &nova_url);
        push_opt(&mut out, ctx, "nova_region_name", "region");
        if ctx.contains("auth_host") {
            push_kv(&mut out, "nova_admin_username", &text(ctx, "admin_user"));
            push_kv(&mut out, "nova_admin_password", &text(ctx, "admin_password"));
            push_kv(&mut out, "nova_admin_tenant_name", &text(ctx, "admin_tenant_name"));
            push_kv(&mut out, "nova_admin_auth_url", &auth_url(ctx));
        }
    }

    if ctx.contains("rabbitmq_host") {
        out.push('\n');
        push_kv(&mut out, "rpc_backend", "neutron.openstack.common.rpc.impl_kombu");
        push_kv(&mut out, "rabbit_userid", &text(ctx, "rabbitmq_user"));
        push_kv(&mut out, "rabbit_virtual_host", &text(ctx, "rabbitmq_virtual_host"));
        push_kv(&mut out, "rabbit_password", &text(ctx, "rabbitmq_password"));
        match ctx.text("rabbitmq_hosts") {
            Some(hosts) => push_kv(&mut out, "rabbit_hosts", &hosts),
            None => push_kv(&mut out, "rabbit_host", &text(ctx, "rabbitmq_host")),
        }
        if let Some(port) = ctx.text("rabbit_ssl_port") {
            push_kv(&mut out, "rabbit_use_ssl", "True");
            push_kv(&mut out, "rabbit_port", &port);
        }
        if ctx.flag("rabbitmq_ha_queues") {
            push_kv(&mut out, "rabbit_ha_queues", "True");
        }
    }

    out.push_str("\n[quotas]\n");
    push_kv(&mut out, "quota_driver", "neutron.db.quota_db.DbQuotaDriver");

    out.push_str("\n[agent]\n");
    push_kv(&mut out, "root_helper", "sudo /usr/bin/neutron-rootwrap /etc/neutron/rootwrap.conf");

    out.push_str("\n[keystone_authtoken]\n");
    if ctx.contains("auth_host") {
        push_kv(&mut out, "signing_dir", "/var/lib/neutron/keystone-signing");
        push_kv(&mut out, "auth_uri", &format!(
            "{}://{}:{}/",
            text(ctx, "service_protocol"),
            text(ctx, "service_host"),
            text(ctx, "service_port")
        ));
        push_kv(&mut out, "auth_host", &text(ctx, "auth_host"));
        push_kv(&mut out, "auth_port", &text(ctx, "auth_port"));
        push_kv(&mut out, "auth_protocol", &text(ctx, "auth_protocol"));
        push_kv(&mut out, "admin_tenant_name", &text(ctx, "admin_tenant_name"));
        push_kv(&mut out, "admin_user", &text(ctx, "admin_user"));
        push_kv(&mut out, "admin_password", &text(ctx, "admin_password"));
    }

    out.push_str("\n[database]\n");
    if let Some(url) = database_url(ctx) {
        push_kv(&mut out, "connection", &url);
    }

    out
}

fn auth_url(ctx: &ConfigFragment) -> String {
    format!(
        "{}://{}:{}/v2.0",
        text(ctx, "auth_protocol"),
        text(ctx, "auth_host"),
        text(ctx, "auth_port")
    )
}

/// SQLAlchemy connection string, when a database context is complete.
pub fn database_url(ctx: &ConfigFragment) -> Option<String> {
    let host = ctx.text("database_host")?;
    let kind = ctx.text("database_type")?;
    let mut url = format!(
        "{}://{}:{}@{}/{}",
        kind,
        text(ctx, "database_user"),
        text(ctx, "database_password"),
        host,
        text(ctx, "database")
    );
    if kind == "mysql" {
        url.push_str("?charset=utf8");
    }
    Some(url)
}

/// `/etc/default/neutron-server`
pub fn neutron_default(ctx: &ConfigFragment) -> String {
    format!(
        "# defaults for neutron-server\n\
         # maintained by neutron-api-hook\n\
         NEUTRON_PLUGIN_CONFIG=\"{}\"\n",
        text(ctx, "plugin_config")
    )
}

/// `/etc/neutron/plugins/ml2/ml2_conf.ini`
pub fn ml2_conf(ctx: &ConfigFragment) -> String {
    let mut out = String::from(HEADER);
    let overlay = text(ctx, "overlay_network_type");
    let mut mechanisms = String::from("openvswitch,hyperv");
    if ctx.flag("l2_population") {
        mechanisms.push_str(",l2population");
    }

    out.push_str("[ml2]\n");
    push_kv(&mut out, "type_drivers", "gre,vxlan,vlan,flat");
    push_kv(&mut out, "tenant_network_types", &overlay);
    push_kv(&mut out, "mechanism_drivers", &mechanisms);

    out.push_str("\n[ml2_type_gre]\n");
    push_kv(&mut out, "tunnel_id_ranges", "1:1000");
    out.push_str("\n[ml2_type_vxlan]\n");
    push_kv(&mut out, "vni_ranges", "1001:2000");
    out.push_str("\n[ml2_type_vlan]\n");
    push_kv(&mut out, "network_vlan_ranges", "physnet1:1000:2000");
    out.push_str("\n[ml2_type_flat]\n");
    push_kv(&mut out, "flat_networks", "physnet1");

    out.push_str("\n[securitygroup]\n");
    if ctx.flag("neutron_security_groups") {
        push_kv(&mut out, "enable_security_group", "True");
        push_kv(
            &mut out,
            "firewall_driver",
            "neutron.agent.linux.iptables_firewall.OVSHybridIptablesFirewallDriver",
        );
    } else {
        push_kv(&mut out, "enable_security_group", "False");
    }

    if let Some(url) = database_url(ctx) {
        out.push_str("\n[database]\n");
        push_kv(&mut out, "connection", &url);
    }
    out
}

/// `/etc/neutron/plugins/vmware/nsx.ini`
pub fn nsx_ini(ctx: &ConfigFragment) -> String {
    let mut out = String::from(HEADER);
    out.push_str("[DEFAULT]\n");
    push_opt(&mut out, ctx, "nsx_user", "nsx_username");
    push_opt(&mut out, ctx, "nsx_password", "nsx_password");
    push_opt(&mut out, ctx, "nsx_controllers", "nsx_controllers");
    push_opt(&mut out, ctx, "default_tz_uuid", "nsx_tz_uuid");
    push_opt(&mut out, ctx, "default_l3_gw_service_uuid", "nsx_l3_uuid");

    out.push_str("\n[quotas]\n\n[nsx]\n");
    push_kv(&mut out, "metadata_mode", "access_network");

    if let Some(url) = database_url(ctx) {
        out.push_str("\n[database]\n");
        push_kv(&mut out, "connection", &url);
    }
    out
}

/// `/etc/haproxy/haproxy.cfg`
pub fn haproxy_cfg(ctx: &ConfigFragment) -> String {
    let mut out = String::from(HEADER);
    out.push_str(
        "global
    log /var/lib/haproxy/dev/log local0
    log /var/lib/haproxy/dev/log local1 notice
    maxconn 20000
    user haproxy
    group haproxy
    spread-checks 0

defaults
    log global
    mode tcp
    option tcplog
    option dontlognull
    retries 3
    timeout queue 1000
    timeout connect 1000
    timeout client 30000
    timeout server 30000

listen stats :8888
    mode http
    stats enable
    stats hide-version
    stats realm Haproxy\\ Statistics
    stats uri /
    stats auth admin:password
",
    );

    let (Some(Value::Object(units)), Some(Value::Object(services))) =
        (ctx.get("units"), ctx.get("service_ports"))
    else {
        return out;
    };

    for (service, ports) in services {
        let ports: Vec<String> = ports
            .as_array()
            .map(|p| p.iter().map(|v| v.to_string()).collect())
            .unwrap_or_default();
        let (Some(frontend), Some(backend)) = (ports.first(), ports.get(1)) else {
            continue;
        };
        out.push_str(&format!("\nfrontend tcp-in_{}\n", service));
        out.push_str(&format!("    bind *:{}\n", frontend));
        if ctx.flag("haproxy_ipv6") {
            out.push_str(&format!("    bind :::{}\n", frontend));
        }
        out.push_str(&format!("    default_backend {}\n", service));

        out.push_str(&format!("\nbackend {}\n", service));
        out.push_str("    balance leastconn\n");
        for (unit, addr) in units {
            let addr = addr.as_str().unwrap_or_default();
            out.push_str(&format!(
                "    server {} {}:{} check\n",
                unit,
                crate::network::format_host(addr),
                backend
            ));
        }
    }
    out
}

/// `/etc/default/haproxy`
pub fn haproxy_default(ctx: &ConfigFragment) -> String {
    let enabled = if ctx.contains("units") { 1 } else { 0 };
    format!("ENABLED={}\n", enabled)
}

/// `/etc/apache2/sites-available/openstack_https_frontend.conf`
pub fn apache_site(ctx: &ConfigFragment) -> String {
    let mut out = String::new();
    let Some(Value::Array(endpoints)) = ctx.get("endpoints") else {
        return out;
    };
    let ssl_dir = text(ctx, "ssl_dir");

    if let Some(Value::Array(ports)) = ctx.get("ext_ports") {
        for port in ports {
            out.push_str(&format!("Listen {}\n", port));
        }
    }
    for endpoint in endpoints {
        let Some(fields) = endpoint.as_array() else {
            continue;
        };
        let field = |i: usize| match fields.get(i) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let (address, server_name, ext_port, int_port) = (field(0), field(1), field(2), field(3));
        out.push_str(&format!(
            "\n<VirtualHost {}:{}>\n\
             \x20   ServerName {}\n\
             \x20   SSLEngine on\n\
             \x20   SSLCertificateFile {}/cert\n\
             \x20   SSLCertificateKeyFile {}/key\n\
             \x20   ProxyPass / http://localhost:{}/\n\
             \x20   ProxyPassReverse / http://localhost:{}/\n\
             \x20   ProxyPreserveHost on\n\
             </VirtualHost>\n",
            crate::network::format_host(&address),
            ext_port,
            server_name,
            ssl_dir,
            ssl_dir,
            int_port,
            int_port
        ));
    }
    out.push_str(
        "\n<Proxy *>\n    Order deny,allow\n    Allow from all\n</Proxy>\n\
         <Location />\n    Order allow,deny\n    Allow from all\n</Location>\n",
    );
    out
}

/// `/etc/apache2/ssl/neutron/cert`
pub fn ssl_cert(ctx: &ConfigFragment) -> String {
    pem(text(ctx, "ssl_cert"))
}

/// `/etc/apache2/ssl/neutron/key`
pub fn ssl_key(ctx: &ConfigFragment) -> String {
    pem(text(ctx, "ssl_key"))
}

fn pem(mut body: String) -> String {
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body
}
