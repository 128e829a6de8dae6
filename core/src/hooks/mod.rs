//! Hook dispatch.
//!
//! A `HookRegistry` maps hook names to plain handler functions, each tagged
//! with how services are bounced afterwards. Dispatch snapshots the checksum
//! of every file in the restart map, runs the handler, and on success plans
//! and applies restarts for whatever changed. A failing handler restarts
//! nothing.

pub mod advertise;
pub mod handlers;

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::error::{AgentError, Result};
use crate::reconciler::Reconciler;
use crate::types::action::HostAction;
use crate::types::event::Event;

pub use crate::convergence::planner::RestartMode;
pub use handlers::register_hooks;

/// Relations whose facts a handler may read.
pub const RELATIONS: &[&str] = &[
    "amqp",
    "shared-db",
    "pgsql-db",
    "identity-service",
    "neutron-api",
    "neutron-plugin-api",
    "cluster",
    "ha",
    "vsd-rest-api",
];

pub type Handler = fn(&mut Reconciler, &Event) -> Result<()>;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The handler ran and these service actions followed.
    Handled { restarts: Vec<HostAction> },
    /// No handler is registered under the event's name.
    Unregistered,
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, (Handler, RestartMode)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`. Names are unique.
    pub fn register(&mut self, name: &str, handler: Handler, mode: RestartMode) -> Result<()> {
        if self.hooks.contains_key(name) {
            return Err(AgentError::DuplicateHook(name.to_string()));
        }
        self.hooks.insert(name.to_string(), (handler, mode));
        Ok(())
    }

    /// Register one handler under several names.
    pub fn register_all(&mut self, names: &[&str], handler: Handler, mode: RestartMode) -> Result<()> {
        for name in names {
            self.register(name, handler, mode)?;
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    pub fn restart_mode(&self, name: &str) -> Option<RestartMode> {
        self.hooks.get(name).map(|(_, mode)| *mode)
    }

    pub fn dispatch(&self, rec: &mut Reconciler, event: &Event) -> Result<DispatchOutcome> {
        let Some((handler, mode)) = self.hooks.get(&event.name) else {
            info!(hook = %event.name, "Unknown hook - skipping.");
            return Ok(DispatchOutcome::Unregistered);
        };

        info!(
            hook = %event.name,
            relation_id = event.relation_id.as_deref().unwrap_or("-"),
            remote_unit = event.remote_unit.as_deref().unwrap_or("-"),
            "running hook"
        );
        let before = rec.checksums();
        if let Err(e) = handler(rec, event) {
            error!(hook = %event.name, error = %e, "hook failed");
            return Err(e);
        }
        let restarts = rec.apply_restarts(&before, *mode).map_err(|e| {
            error!(hook = %event.name, error = %e, "service restart failed");
            e
        })?;
        Ok(DispatchOutcome::Handled { restarts })
    }
}
