//! Retry decisions for failed attempts
//!
//! The host scheduler owns attempt counting and backoff timing. After a failure this
//! module only answers one question: should the host try again, or should we stop here
//! and alert?
//!
//! ```text
//! Running ──success─────────────────────────────▶ Succeeded
//!    │
//!    └─failure─┬─ retry disabled ───────────────▶ FailedSuppressed (alert)
//!              ├─ not transient ────────────────▶ FailedSuppressed (alert)
//!              ├─ retry_count == notify_on_attempt ─▶ FailedSuppressed (alert)
//!              └─ otherwise ────────────────────▶ FailedPropagated (host retries)
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use std::time::Duration;

/// Lifecycle of a single attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptState {
    /// Request not finished yet
    Running,
    /// The request completed
    Succeeded,
    /// Failed; alert sent (if enabled) and the host is told not to retry
    FailedSuppressed,
    /// Failed; handed back to the host for another attempt
    FailedPropagated,
}

impl AttemptState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptState::Running)
    }
}

/// What to do with a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop and send the failure notification
    Suppress,
    /// Let the host schedule another attempt after `delay`
    Propagate {
        /// Suggested wait before the next attempt
        delay: Duration,
    },
}

impl RetryDecision {
    /// State the attempt ends in
    pub fn state(self) -> AttemptState {
        match self {
            RetryDecision::Suppress => AttemptState::FailedSuppressed,
            RetryDecision::Propagate { .. } => AttemptState::FailedPropagated,
        }
    }
}

/// Decides between host retry and final notification
#[derive(Clone, Debug)]
pub struct RetryCoordinator {
    config: RetryConfig,
}

impl RetryCoordinator {
    /// Create a coordinator for the given policy
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Decide what happens after `error`
    ///
    /// `retry_count` is the number of retries the host has already performed, as handed
    /// to us for this invocation (None on the first run).
    pub fn on_failure(
        &self,
        enable_retry: bool,
        retry_count: Option<u32>,
        error: &Error,
    ) -> RetryDecision {
        if !enable_retry {
            tracing::info!(error = %error, "retry disabled for job, reporting failure");
            return RetryDecision::Suppress;
        }

        if !error.is_transient() {
            tracing::info!(
                error = %error,
                kind = ?error.kind(),
                "failure is not retryable, reporting failure"
            );
            return RetryDecision::Suppress;
        }

        let count = retry_count.unwrap_or(0);
        if retry_count == Some(self.config.notify_on_attempt) {
            tracing::warn!(
                error = %error,
                retry_count = count,
                "final retry failed, reporting failure"
            );
            return RetryDecision::Suppress;
        }

        let delay = self.config.delay_for_attempt(count);
        tracing::warn!(
            error = %error,
            retry_count = count,
            max_attempts = self.config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, handing back to scheduler for retry"
        );
        RetryDecision::Propagate { delay }
    }
}
