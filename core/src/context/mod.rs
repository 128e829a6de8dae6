//! Context builders: turn settings and relation facts into template values.
//!
//! Each builder is a pure function of a [`BuildEnv`]: it reads local
//! settings, the fact store and the network snapshot, and either produces a
//! complete [`ConfigFragment`] or `None` when its inputs are not all present
//! yet. Builders never do I/O and never produce a partial fragment.

pub mod amqp;
pub mod database;
pub mod haproxy;
pub mod https;
pub mod identity;
pub mod neutron;
pub mod vsd;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::facts::FactStore;
use crate::network::NetworkInfo;
use crate::types::config::LocalSettings;
use crate::types::relation::fact_text;

pub use amqp::AmqpContext;
pub use database::{PostgresqlDbContext, SharedDbContext};
pub use haproxy::HaproxyContext;
pub use https::HttpsContext;
pub use identity::IdentityServiceContext;
pub use neutron::NeutronCcContext;
pub use vsd::{VsdContext, RESTPROXY_KEYS};

/// Public port of the neutron API.
pub const NEUTRON_SERVER_PORT: u16 = 9696;

/// Everything a builder may look at.
#[derive(Debug, Clone, Copy)]
pub struct BuildEnv<'a> {
    pub settings: &'a LocalSettings,
    pub facts: &'a FactStore,
    pub net: &'a NetworkInfo,
}

impl<'a> BuildEnv<'a> {
    pub fn new(settings: &'a LocalSettings, facts: &'a FactStore, net: &'a NetworkInfo) -> Self {
        BuildEnv { settings, facts, net }
    }
}

/// Named template values produced by one builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFragment {
    values: BTreeMap<String, Value>,
}

impl ConfigFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The value as text; empty strings and nulls read as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(fact_text)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(Value::Bool(true)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Union `other` into this fragment; keys in `other` win.
    pub fn merge(&mut self, other: ConfigFragment) {
        self.values.extend(other.values);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A source of template values for one concern.
pub trait ContextBuilder {
    /// Stable name, reported by `complete_contexts`.
    fn name(&self) -> &'static str;

    /// The fragment, or `None` while required inputs are missing.
    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment>;
}

/// Whether TLS termination in front of the API is configured.
pub fn https_enabled(settings: &LocalSettings) -> bool {
    let set = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
    set(&settings.ssl_cert) && set(&settings.ssl_key)
}

fn haproxy_layer(env: &BuildEnv, singlenode: bool) -> u16 {
    if singlenode || env.facts.peer_count() > 0 || env.facts.is_clustered() {
        1
    } else {
        0
    }
}

/// Port the API server itself binds to, 10 below the public port for each
/// proxy layer (haproxy, then apache) in front of it.
pub fn determine_api_port(env: &BuildEnv, public_port: u16, singlenode: bool) -> u16 {
    let layers = haproxy_layer(env, singlenode) + u16::from(https_enabled(env.settings));
    public_port - layers * 10
}

/// Port the apache TLS frontend listens on, behind haproxy when present.
pub fn determine_apache_port(env: &BuildEnv, public_port: u16, singlenode: bool) -> u16 {
    public_port - haproxy_layer(env, singlenode) * 10
}

pub(crate) fn text_list(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}
