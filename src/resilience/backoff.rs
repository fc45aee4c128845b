//! Exponential backoff with jitter for repeated accept failures.

use std::time::Duration;

use rand::Rng;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Consecutive-failure counter for one accept loop.
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    failures: u32,
    base_ms: u64,
    max_ms: u64,
}

impl AcceptBackoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            failures: 0,
            base_ms,
            max_ms,
        }
    }

    /// Record a failure and return how long to wait before accepting again.
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        calculate_backoff(self.failures, self.base_ms, self.max_ms)
    }

    /// A successful accept clears the streak.
    pub fn on_success(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new(50, 5_000)
    }
}
