//! Backoff policy for transport failures
//!
//! This module decides how long a request chain waits before it re-dispatches
//! a request whose transport call failed. The schedule has:
//!
//! - Linear growth of one `step` per consecutive failure
//! - A hard `cap` on the wait between attempts
//! - No jitter
//! - An optional ceiling on consecutive failures (unbounded by default)
//!
//! Only transport failures go through this policy. Waits requested by an
//! application continuation are used verbatim and never pass through here.

use std::time::Duration;

/// Wait added per consecutive failure
pub const DEFAULT_STEP_MS: u64 = 100;

/// Upper bound for a single failure wait
pub const DEFAULT_CAP_MS: u64 = 300;

/// Configuration for the failure backoff schedule
///
/// Controls how a request chain reacts to transport failures:
/// - How much the wait grows after each consecutive failure
/// - The maximum wait between two attempts
/// - Whether the chain ever gives up
///
/// # Examples
///
/// ```
/// use pingback::retry::BackoffPolicy;
/// use std::time::Duration;
///
/// // Default policy: 100ms, 200ms, 300ms, 300ms, ... forever
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.next_failure_wait(1), Duration::from_millis(100));
/// assert_eq!(policy.next_failure_wait(7), Duration::from_millis(300));
///
/// // Give up after the fifth consecutive failure
/// let bounded = BackoffPolicy::default().with_max_failures(5);
/// assert!(bounded.allows_retry(4));
/// assert!(!bounded.allows_retry(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Wait added per consecutive failure
    pub step: Duration,

    /// Maximum wait between two attempts
    pub cap: Duration,

    /// Number of consecutive failures after which the chain gives up
    pub max_failures: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(DEFAULT_STEP_MS),
            cap: Duration::from_millis(DEFAULT_CAP_MS),
            max_failures: None, // retry until success, finish() or clear()
        }
    }
}

impl BackoffPolicy {
    /// Sets a ceiling on consecutive transport failures
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = Some(max_failures);
        self
    }

    /// Computes the wait after the `failures`-th consecutive transport failure
    ///
    /// `failures` is 1-based. The result is `min(step * failures, cap)`, so the
    /// default policy yields `100, 200, 300, 300, ...` milliseconds.
    ///
    /// # Arguments
    /// * `failures` - Number of consecutive failures including the one just observed
    ///
    /// # Returns
    /// * `Duration` - How long to wait before the next attempt
    pub fn next_failure_wait(&self, failures: u32) -> Duration {
        self.step.saturating_mul(failures).min(self.cap)
    }

    /// Returns true when another attempt may follow `failures` consecutive failures
    pub fn allows_retry(&self, failures: u32) -> bool {
        match self.max_failures {
            Some(max) => failures < max,
            None => true,
        }
    }
}

/// Wait after the `failures`-th consecutive failure under the default policy
pub fn next_failure_wait(failures: u32) -> Duration {
    BackoffPolicy::default().next_failure_wait(failures)
}
