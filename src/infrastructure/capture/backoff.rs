//! Reconnect Backoff
//!
//! Exponential backoff schedule for stream reconnection: each retry waits
//! 1.5x longer than the previous one, capped at a maximum.

use std::time::Duration;

const BACKOFF_FACTOR: f64 = 1.5;

/// Exponential backoff state for the capture reconnect loop.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl ReconnectBackoff {
    /// Creates a backoff starting at `initial`, capped at `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the delay to wait before the next retry and advances the
    /// schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(BACKOFF_FACTOR).min(self.max);
        delay
    }

    /// Resets the schedule after a successful read.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_grows_by_half_and_caps() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(30), Duration::from_secs(300));

        let delays: Vec<f64> = (0..8).map(|_| backoff.next_delay().as_secs_f64()).collect();
        let expected = [30.0, 45.0, 67.5, 101.25, 151.875, 227.8125, 300.0, 300.0];

        for (delay, expected) in delays.iter().zip(expected.iter()) {
            assert!(
                (delay - expected).abs() < 1e-6,
                "expected {expected}, got {delay}"
            );
        }
    }

    #[test]
    fn reset_returns_to_initial_delay() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(30), Duration::from_secs(300));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn capped_schedule_stays_at_max() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(200), Duration::from_secs(300));
        assert_eq!(backoff.next_delay(), Duration::from_secs(200));
        assert_eq!(backoff.next_delay(), Duration::from_secs(300));
        assert_eq!(backoff.next_delay(), Duration::from_secs(300));
    }
}
