//! Delay between scheduled sync passes.

use std::time::Duration;

/// Exponential backoff that falls back to the regular interval after a
/// successful pass.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    interval: Duration,
    failures: u32,
}

impl Backoff {
    pub const fn new(base: Duration, cap: Duration, interval: Duration) -> Self {
        Self {
            base,
            cap,
            interval,
            failures: 0,
        }
    }

    /// Consecutive failed passes seen so far.
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay after a successful pass.
    pub fn succeeded(&mut self) -> Duration {
        self.failures = 0;
        self.interval
    }

    /// Delay after a failed pass: `base * 2^(n-1)`, capped.
    pub fn failed(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let factor = 1_u32
            .checked_shl(self.failures - 1)
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(
            Duration::from_secs(10),
            Duration::from_secs(120),
            Duration::from_secs(900),
        )
    }

    #[test]
    fn doubles_until_cap() {
        let mut backoff = backoff();
        let delays = (0..6).map(|_| backoff.failed().as_secs()).collect::<Vec<_>>();
        assert_eq!(delays, vec![10, 20, 40, 80, 120, 120]);
        assert_eq!(backoff.failures(), 6);
    }

    #[test]
    fn success_resets_to_interval() {
        let mut backoff = backoff();
        backoff.failed();
        backoff.failed();
        assert_eq!(backoff.succeeded(), Duration::from_secs(900));
        assert_eq!(backoff.failed(), Duration::from_secs(10));
    }

    #[test]
    fn many_failures_do_not_overflow() {
        let mut backoff = backoff();
        for _ in 0..100 {
            assert!(backoff.failed() <= Duration::from_secs(120));
        }
    }
}
