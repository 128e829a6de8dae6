//! Convergence executor: runs planned host actions through a backend with retry.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::convergence::retry::{ActionRetryTracker, RetryPolicy};
use crate::error::AgentError;
use crate::infrastructure::HostBackend;
use crate::types::action::HostAction;

/// Outcome of a convergence execution pass.
#[derive(Debug, Clone)]
pub struct ConvergenceResult {
    pub succeeded: Vec<HostAction>,
    /// The action that stopped the pass, with the backend's last error.
    pub failed: Option<(HostAction, String)>,
    /// Actions never attempted because an earlier one failed.
    pub skipped: Vec<HostAction>,
    pub retries_used: u32,
}

impl ConvergenceResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Convert a failed pass into the error the handlers propagate.
    pub fn into_result(self) -> Result<Vec<HostAction>, AgentError> {
        match self.failed {
            None => Ok(self.succeeded),
            Some((action, message)) => Err(AgentError::Host {
                action: action.key(),
                message,
            }),
        }
    }
}

/// Executes an ordered batch of actions through a `HostBackend`.
///
/// Actions run strictly in order. A failing action is retried in place while
/// the policy allows it; once it gives up, the remaining actions are skipped.
pub struct ConvergenceExecutor {
    retry_tracker: ActionRetryTracker,
}

impl ConvergenceExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        ConvergenceExecutor {
            retry_tracker: ActionRetryTracker::new(policy),
        }
    }

    pub fn execute(
        &mut self,
        actions: Vec<HostAction>,
        backend: &mut dyn HostBackend,
    ) -> ConvergenceResult {
        let mut succeeded = Vec::new();
        let mut retries_used: u32 = 0;
        let mut pending = actions.into_iter();

        while let Some(action) = pending.next() {
            let key = action.key();
            loop {
                match backend.execute_action(&action) {
                    Ok(()) => {
                        debug!(action = %key, "host action applied");
                        self.retry_tracker.record_success(&key);
                        succeeded.push(action);
                        break;
                    }
                    Err(e) => {
                        self.retry_tracker.record_failure(&key);
                        if !self.retry_tracker.can_retry(&action) {
                            warn!(action = %key, error = %e, "host action failed");
                            return ConvergenceResult {
                                succeeded,
                                failed: Some((action, e)),
                                skipped: pending.collect(),
                                retries_used,
                            };
                        }
                        let delay = self.retry_tracker.next_delay_ms(&key);
                        debug!(action = %key, error = %e, delay_ms = delay, "retrying host action");
                        retries_used += 1;
                        if delay > 0 {
                            thread::sleep(Duration::from_millis(delay));
                        }
                    }
                }
            }
        }

        ConvergenceResult {
            succeeded,
            failed: None,
            skipped: Vec::new(),
            retries_used,
        }
    }
}
