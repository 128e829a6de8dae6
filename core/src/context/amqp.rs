//! Message-bus credentials from the `amqp` relation.

use crate::facts::FactLookup;
use tracing::info;

use super::{text_list, BuildEnv, ConfigFragment, ContextBuilder};

const REQUIRED: &[&str] = &["password", "private-address"];

pub struct AmqpContext;

impl ContextBuilder for AmqpContext {
    fn name(&self) -> &'static str {
        "amqp"
    }

    fn render(&self, env: &BuildEnv) -> Option<ConfigFragment> {
        let sets = match env.facts.facts_for("amqp", REQUIRED) {
            FactLookup::Complete(sets) => sets,
            FactLookup::Incomplete { reason, .. } => {
                info!(?reason, "amqp relation incomplete. Peer not ready?");
                return None;
            }
        };

        let mut hosts: Vec<String> = sets
            .iter()
            .filter_map(|s| {
                let clustered = s.text("clustered").is_some();
                if clustered {
                    s.text("vip").or_else(|| s.text("private-address"))
                } else {
                    s.text("private-address")
                }
            })
            .collect();
        let first = &sets[0];
        let host = hosts.first().cloned()?;

        let mut frag = ConfigFragment::new()
            .with("rabbitmq_host", host)
            .with("rabbitmq_user", env.settings.rabbit_user.clone())
            .with("rabbitmq_password", first.text("password")?)
            .with("rabbitmq_virtual_host", env.settings.rabbit_vhost.clone());

        if let Some(ssl_port) = first.text("ssl_port") {
            frag.set("rabbit_ssl_port", ssl_port);
        }
        if first.text("ha_queues").is_some() {
            frag.set("rabbitmq_ha_queues", true);
        }

        hosts.sort();
        hosts.dedup();
        if hosts.len() > 1 {
            frag.set("rabbitmq_hosts", hosts.join(","));
            frag.set("rabbitmq_host_list", text_list(&hosts));
        }
        Some(frag)
    }
}
