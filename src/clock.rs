use std::time::{SystemTime, UNIX_EPOCH};

/// Source of chain creation timestamps
///
/// Queried exactly once per chain, when `send()` starts it. Retries of the
/// chain reuse the captured value.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn timestamp_ms(&self) -> i64;
}

/// Wall clock backed by [`SystemTime`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn timestamp_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }
}
