//! Retry policies and per-action retry tracking.
//!
//! Package operations routinely fail while another process holds the dpkg
//! lock, so they are retried after a fixed pause. Everything else (relation-set,
//! service control, site toggles) gets exactly one attempt.

use std::collections::HashMap;

use crate::types::action::HostAction;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How many times a retryable action may be re-attempted, and the fixed
/// pause between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay_ms: u64) -> Self {
        RetryPolicy {
            max_retries,
            delay_ms,
        }
    }

    /// Whether the given attempt number (0-indexed) is within the retry budget.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    /// 30 retries 10s apart, about as long as unattended upgrades hold the
    /// apt lock.
    fn default() -> Self {
        RetryPolicy::new(30, 10_000)
    }
}

/// Whether an action is worth retrying at all.
pub fn is_retryable(action: &HostAction) -> bool {
    matches!(
        action,
        HostAction::AddSource { .. }
            | HostAction::AptUpdate
            | HostAction::AptInstall { .. }
            | HostAction::AptUpgrade
    )
}

// ---------------------------------------------------------------------------
// ActionRetryTracker
// ---------------------------------------------------------------------------

/// Tracks failure counts for individual actions, keyed by `HostAction::key`.
#[derive(Debug, Clone)]
pub struct ActionRetryTracker {
    policy: RetryPolicy,
    failures: HashMap<String, u32>,
}

impl ActionRetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        ActionRetryTracker {
            policy,
            failures: HashMap::new(),
        }
    }

    pub fn record_failure(&mut self, action_key: &str) {
        *self.failures.entry(action_key.to_string()).or_insert(0) += 1;
    }

    /// Record a success. Resets the failure count.
    pub fn record_success(&mut self, action_key: &str) {
        self.failures.remove(action_key);
    }

    /// Whether the action may be attempted again.
    pub fn can_retry(&self, action: &HostAction) -> bool {
        if !is_retryable(action) {
            return false;
        }
        let failures = self.failure_count(&action.key());
        failures > 0 && self.policy.should_retry(failures - 1)
    }

    /// Delay before the next attempt of this action. 0 if it never failed.
    pub fn next_delay_ms(&self, action_key: &str) -> u64 {
        match self.failure_count(action_key) {
            0 => 0,
            _ => self.policy.delay_ms,
        }
    }

    pub fn failure_count(&self, action_key: &str) -> u32 {
        self.failures.get(action_key).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
