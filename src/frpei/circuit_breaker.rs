// Per-provider circuit breaker (spec §4.10: "each wrapped in a circuit
// breaker with half-open retries"), mirroring the Relay Pool's breaker
// shape but scoped to FRPEI providers.

use chrono::{DateTime, Utc};
use std::time::Duration;

const TRIP_THRESHOLD: u32 = 3;
const BASE_COOLDOWN: Duration = Duration::from_secs(5);
const MAX_COOLDOWN: Duration = Duration::from_secs(300);

pub struct CircuitBreaker {
    consecutive_failures: u32,
    open_until: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self { consecutive_failures: 0, open_until: None }
    }

    pub fn is_open(&self) -> bool {
        self.open_until.map(|t| t > Utc::now()).unwrap_or(false)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.open_until = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= TRIP_THRESHOLD {
            let exponent = self.consecutive_failures - TRIP_THRESHOLD;
            let cooldown = (BASE_COOLDOWN * 2u32.saturating_pow(exponent)).min(MAX_COOLDOWN);
            self.open_until = Some(Utc::now() + chrono::Duration::from_std(cooldown).unwrap());
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_trips_after_threshold_failures() {
        let mut breaker = CircuitBreaker::new();
        for _ in 0..TRIP_THRESHOLD {
            breaker.record_failure();
        }
        assert!(breaker.is_open());
    }

    #[test]
    fn success_resets_the_breaker() {
        let mut breaker = CircuitBreaker::new();
        for _ in 0..TRIP_THRESHOLD {
            breaker.record_failure();
        }
        breaker.record_success();
        assert!(!breaker.is_open());
    }
}
