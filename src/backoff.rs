use rand::Rng;
use std::time::Duration;

/// Retry delay that doubles per attempt up to a ceiling, plus random jitter.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base_ms: u64,
    max_ms: u64,
    jitter_percent: u64,
}

impl ExponentialBackoff {
    pub const fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter_percent: 10,
        }
    }

    pub fn with_jitter(mut self, jitter_percent: u64) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    /// Delay before retry number `attempt + 1`; attempt 0 waits `base_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        let capped = doubled.min(self.max_ms);
        let spread = capped.saturating_mul(self.jitter_percent) / 100;
        let jitter = if spread > 0 {
            rand::thread_rng().gen_range(0..=spread)
        } else {
            0
        };
        Duration::from_millis(capped.saturating_add(jitter))
    }
}
