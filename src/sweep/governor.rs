//! Token-bucket rate governor
//!
//! Tokens refill continuously at the target rate up to the bucket capacity
//! (the burst). Each probe launch takes one token and waits when none is
//! left, so the long-run launch rate converges on the target regardless of
//! how long individual probes take.

use std::time::Duration;
use tokio::time::Instant;

/// Paces probe launches toward a target rate
#[derive(Debug)]
pub struct RateGovernor {
    rate_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateGovernor {
    /// Creates a governor releasing `requests_per_second` tokens per second
    ///
    /// The bucket starts full, so the first `burst` launches go out at once.
    /// Zero arguments are raised to one.
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            rate_per_sec: f64::from(requests_per_second.max(1)),
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    /// Minimum spacing between launches once the burst is spent
    #[cfg(test)]
    fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_per_sec)
    }

    /// Waits until a token is available and takes it
    pub async fn acquire(&mut self) {
        loop {
            self.refill();
            if self.tokens >= 1.0 {
                self.tokens -= 1.0;
                return;
            }

            let missing = 1.0 - self.tokens;
            tokio::time::sleep(Duration::from_secs_f64(missing / self.rate_per_sec)).await;
        }
    }

    /// Takes a token only if one is available right now
    #[cfg(test)]
    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval() {
        assert_eq!(RateGovernor::new(4, 1).interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_burst_is_available_immediately() {
        let mut governor = RateGovernor::new(1, 3);

        assert!(governor.try_acquire());
        assert!(governor.try_acquire());
        assert!(governor.try_acquire());
        assert!(!governor.try_acquire());
    }

    #[test]
    fn test_zero_inputs_are_raised() {
        let mut governor = RateGovernor::new(0, 0);
        assert_eq!(governor.interval(), Duration::from_secs(1));
        assert!(governor.try_acquire());
        assert!(!governor.try_acquire());
    }

    #[tokio::test]
    async fn test_launches_are_spaced_by_interval() {
        let mut governor = RateGovernor::new(50, 1);
        let launches = 6;

        let start = Instant::now();
        for _ in 0..launches {
            governor.acquire().await;
        }

        // first launch is free, the other five wait 20ms each
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_idle_time_does_not_exceed_burst() {
        let mut governor = RateGovernor::new(10, 2);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(governor.try_acquire());
        assert!(governor.try_acquire());
        assert!(!governor.try_acquire());
    }
}
