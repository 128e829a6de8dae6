//! The managed files of a neutron-api unit, per plugin.

use std::path::Path;

use crate::context::{
    AmqpContext, HaproxyContext, HttpsContext, IdentityServiceContext, NeutronCcContext,
    PostgresqlDbContext, SharedDbContext,
};
use crate::packages::{
    plugin_attrs, APACHE_SITE_CONF, APACHE_SSL_DIR, HAPROXY_CONF, HAPROXY_DEFAULT, NEUTRON_CONF,
    NEUTRON_DEFAULT,
};
use crate::types::config::{LocalSettings, NeutronPlugin};

use super::templates;
use super::{ConfigRegistry, ManagedFile, Template};

/// Build the registry for the configured plugin, rooted at `root`.
pub fn register_configs(settings: &LocalSettings, root: &Path) -> ConfigRegistry {
    let mut reg = ConfigRegistry::new(root);
    let attrs = plugin_attrs(settings.neutron_plugin);

    reg.register(
        ManagedFile::new(NEUTRON_CONF, templates::neutron_conf)
            .builder(AmqpContext)
            .builder(SharedDbContext)
            .builder(PostgresqlDbContext)
            .builder(IdentityServiceContext)
            .builder(NeutronCcContext)
            .restarts(&["neutron-server"]),
    );
    reg.register(
        ManagedFile::new(NEUTRON_DEFAULT, templates::neutron_default)
            .builder(NeutronCcContext)
            .restarts(&["neutron-server"]),
    );

    if attrs.rendered {
        let template: Template = match settings.neutron_plugin {
            NeutronPlugin::Nsx => templates::nsx_ini,
            _ => templates::ml2_conf,
        };
        reg.register(
            ManagedFile::new(attrs.config, template)
                .builder(SharedDbContext)
                .builder(PostgresqlDbContext)
                .builder(NeutronCcContext)
                .restarts(&["neutron-server"]),
        );
    } else {
        reg.watch(settings.vsd_config_file.as_str(), &["neutron-server"]);
    }

    reg.register(
        ManagedFile::new(HAPROXY_CONF, templates::haproxy_cfg)
            .builder(HaproxyContext)
            .restarts(&["haproxy"]),
    );
    reg.register(
        ManagedFile::new(HAPROXY_DEFAULT, templates::haproxy_default)
            .builder(HaproxyContext)
            .restarts(&["haproxy"]),
    );

    let ssl_dir = Path::new(APACHE_SSL_DIR);
    reg.register(
        ManagedFile::new(ssl_dir.join("cert"), templates::ssl_cert)
            .builder(HttpsContext)
            .requires("https")
            .restarts(&["apache2"]),
    );
    reg.register(
        ManagedFile::new(ssl_dir.join("key"), templates::ssl_key)
            .builder(HttpsContext)
            .requires("https")
            .restarts(&["apache2"]),
    );
    reg.register(
        ManagedFile::new(APACHE_SITE_CONF, templates::apache_site)
            .builder(HttpsContext)
            .restarts(&["apache2"]),
    );
    reg
}
