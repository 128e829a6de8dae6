//! Faults raised while handling a hook.
//!
//! A relation that is not ready yet is *not* an error: it is reported through
//! `FactLookup::Incomplete` or a builder returning `None`. Everything in this
//! enum is a real fault that stops the current handler.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Two mutually exclusive relations are joined at the same time.
    #[error("attempting to associate a {requested} database when there is already associated a {existing} one")]
    ConflictingBackend { requested: String, existing: String },

    /// A managed or patched file could not be read or written.
    #[error("cannot access {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller-supplied input was rejected before anything was mutated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Local settings could not be loaded or are inconsistent.
    #[error("settings error: {0}")]
    Settings(String),

    /// Relation facts could not be gathered or decoded.
    #[error("relation facts error: {0}")]
    Facts(String),

    /// The host backend refused or failed an action.
    #[error("host action '{action}' failed: {message}")]
    Host { action: String, message: String },

    /// One or more managed files failed to render; the rest were attempted.
    #[error("failed to render {}", render_failure_list(.0))]
    Render(Vec<(PathBuf, String)>),

    /// A hook name was registered twice.
    #[error("hook '{0}' registered more than once")]
    DuplicateHook(String),
}

impl AgentError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AgentError::FileAccess {
            path: path.into(),
            source,
        }
    }
}

fn render_failure_list(failures: &[(PathBuf, String)]) -> String {
    failures
        .iter()
        .map(|(path, msg)| format!("{} ({})", path.display(), msg))
        .collect::<Vec<_>>()
        .join(", ")
}
