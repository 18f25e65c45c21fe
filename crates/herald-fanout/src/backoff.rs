use std::time::Duration;

/// Jitter fraction applied to each delay (+0 … 10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Exponential reconnect delay with jitter.
///
/// Schedule: base → 2·base → 4·base → … → max (cap). Call [`Backoff::reset`]
/// once a connection is healthy again so the next outage starts from `base`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Delay to wait before the next attempt; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay + jitter(delay)
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_millis(500, 30_000)
    }
}

/// Return a jitter offset in `0 … JITTER_FRACTION * base`.
///
/// Derived from the sub-second clock, avoiding a rand dependency.
fn jitter(base: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = (base.as_millis() as f64 * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(nanos as u64 % max_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(delay: Duration, base_ms: u64) -> bool {
        let base = Duration::from_millis(base_ms);
        delay >= base && delay <= base + base / 10
    }

    #[test]
    fn doubles_until_cap() {
        let mut backoff = Backoff::from_millis(100, 350);
        assert!(within(backoff.next_delay(), 100));
        assert!(within(backoff.next_delay(), 200));
        assert!(within(backoff.next_delay(), 350));
        assert!(within(backoff.next_delay(), 350));
    }

    #[test]
    fn reset_restarts_schedule() {
        let mut backoff = Backoff::from_millis(100, 1_000);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert!(within(backoff.next_delay(), 100));
    }

    #[test]
    fn max_below_base_is_raised() {
        let mut backoff = Backoff::from_millis(200, 50);
        assert!(within(backoff.next_delay(), 200));
        assert!(within(backoff.next_delay(), 200));
    }
}
