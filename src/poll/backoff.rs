use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::PollSettings;

/// Failure-driven widening of the polling interval.
///
/// Reaching `max_failures` consecutive failures switches to the wide interval
/// and arms a restore deadline. Restoration is purely time-based: once the
/// deadline passes, the base interval and a zero failure count come back
/// whether or not anything succeeded in between. A success only clears the
/// failure counter.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    wide: Duration,
    max_failures: u32,
    reset_after: Duration,
    interval: Duration,
    failures: u32,
    restore_at: Option<Instant>,
}

impl Backoff {
    pub fn new(settings: &PollSettings) -> Self {
        Self {
            base: settings.interval,
            wide: settings.backoff_interval,
            max_failures: settings.max_failures,
            reset_after: settings.backoff_reset,
            interval: settings.interval,
            failures: 0,
            restore_at: None,
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.expire(now);
        self.failures = 0;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.expire(now);
        self.failures += 1;

        if self.failures >= self.max_failures {
            warn!(
                failures = self.failures,
                interval_ms = self.wide.as_millis() as u64,
                "repeated poll failures, widening interval"
            );
            self.interval = self.wide;
            // Later failures do not push the deadline back.
            if self.restore_at.is_none() {
                self.restore_at = Some(now + self.reset_after);
                crate::metrics::prometheus::record_backoff();
            }
        }
    }

    /// Delay before the next cycle, as of `now`.
    pub fn interval(&mut self, now: Instant) -> Duration {
        self.expire(now);
        self.interval
    }

    pub fn failures(&mut self, now: Instant) -> u32 {
        self.expire(now);
        self.failures
    }

    fn expire(&mut self, now: Instant) {
        if let Some(deadline) = self.restore_at {
            if now >= deadline {
                info!(
                    interval_ms = self.base.as_millis() as u64,
                    "backoff grace period elapsed, restoring interval"
                );
                self.interval = self.base;
                self.failures = 0;
                self.restore_at = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(&PollSettings::default())
    }

    #[test]
    fn three_failures_widen_then_time_restores() {
        let start = Instant::now();
        let mut b = backoff();

        b.record_failure(start);
        b.record_failure(start + Duration::from_secs(1));
        assert_eq!(b.interval(start + Duration::from_secs(2)), Duration::from_millis(1_000));

        let third = start + Duration::from_secs(2);
        b.record_failure(third);
        assert_eq!(b.interval(third), Duration::from_millis(5_000));
        assert_eq!(b.failures(third), 3);

        let just_before = third + Duration::from_millis(9_999);
        assert_eq!(b.interval(just_before), Duration::from_millis(5_000));

        let after = third + Duration::from_secs(10);
        assert_eq!(b.interval(after), Duration::from_millis(1_000));
        assert_eq!(b.failures(after), 0);
    }

    #[test]
    fn success_clears_counter_but_not_wide_interval() {
        let now = Instant::now();
        let mut b = backoff();
        for _ in 0..3 {
            b.record_failure(now);
        }

        b.record_success(now + Duration::from_secs(5));
        assert_eq!(b.failures(now + Duration::from_secs(5)), 0);
        assert_eq!(b.interval(now + Duration::from_secs(5)), Duration::from_millis(5_000));
        assert_eq!(b.interval(now + Duration::from_secs(10)), Duration::from_millis(1_000));
    }

    #[test]
    fn failures_while_widened_keep_first_deadline() {
        let now = Instant::now();
        let mut b = backoff();
        for _ in 0..3 {
            b.record_failure(now);
        }
        b.record_failure(now + Duration::from_secs(5));
        assert_eq!(b.failures(now + Duration::from_secs(5)), 4);

        let deadline = now + Duration::from_secs(10);
        assert_eq!(b.interval(deadline), Duration::from_millis(1_000));
        assert_eq!(b.failures(deadline), 0);
    }

    #[test]
    fn interleaved_success_prevents_backoff() {
        let now = Instant::now();
        let mut b = backoff();
        b.record_failure(now);
        b.record_failure(now);
        b.record_success(now);
        b.record_failure(now);
        b.record_failure(now);
        assert_eq!(b.interval(now), Duration::from_millis(1_000));
    }
}
