//! Jittered exponential backoff between reload attempts.

use rand::Rng;
use std::time::Duration;

use crate::config::ReloadConfig;

/// Delay before reload attempt number `attempt` (1-based; the first attempt has no delay).
pub fn reload_delay(attempt: u32, policy: &ReloadConfig) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 2);
    let capped = policy
        .base_delay_ms
        .saturating_mul(factor)
        .min(policy.max_delay_ms);

    // Up to 10% jitter on top of the capped delay
    let spread = capped / 10;
    let jitter = if spread > 0 {
        rand::thread_rng().gen_range(0..spread)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}
