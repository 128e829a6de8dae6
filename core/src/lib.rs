//! Core of the neutron-api lifecycle agent.
//!
//! One hook invocation flows through here: settings and relation facts are
//! loaded, the matching handler runs against a [`reconciler::Reconciler`],
//! managed files are rendered from context builders, and services whose
//! files changed are restarted. Host side effects go through the
//! [`infrastructure::HostBackend`] trait.

pub mod context;
pub mod convergence;
pub mod data;
pub mod error;
pub mod facts;
pub mod hooks;
pub mod infrastructure;
pub mod network;
pub mod packages;
pub mod patcher;
pub mod reconciler;
pub mod render;
pub mod types;

pub use error::{AgentError, Result};
pub use hooks::{register_hooks, DispatchOutcome, HookRegistry};
pub use reconciler::Reconciler;
