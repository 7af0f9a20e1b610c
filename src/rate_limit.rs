use std::time::{Duration, Instant};

use tracing::debug;

/// Blocks so consecutive calls are at least `min_interval` apart.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn wait(&mut self) {
        let now = Instant::now();
        if let Some(delay) = self.delay_at(now) {
            debug!(delay_ms = delay.as_millis() as u64, "rate limit wait");
            std::thread::sleep(delay);
        }
        self.last = Some(Instant::now());
    }

    /// Callback form the metrics engine takes.
    pub fn into_callback(mut self) -> impl FnMut() + 'static {
        move || self.wait()
    }

    fn delay_at(&self, now: Instant) -> Option<Duration> {
        let last = self.last?;
        let elapsed = now.saturating_duration_since(last);
        let remaining = self.min_interval.saturating_sub(elapsed);
        (!remaining.is_zero()).then_some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::RateLimiter;

    #[test]
    fn first_call_never_waits() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        assert_eq!(limiter.delay_at(Instant::now()), None);
    }

    #[test]
    fn delay_shrinks_with_elapsed_time() {
        let mut limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.last = Some(start);
        let delay = limiter.delay_at(start + Duration::from_millis(40)).expect("still inside window");
        assert_eq!(delay, Duration::from_millis(60));
        assert_eq!(limiter.delay_at(start + Duration::from_millis(150)), None);
    }

    #[test]
    fn zero_interval_is_free() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        limiter.wait();
        limiter.wait();
        assert_eq!(limiter.delay_at(Instant::now()), None);
    }
}
