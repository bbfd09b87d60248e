//! Deadline-based event coalescing
//!
//! Every pushed event replaces the pending value and pushes the deadline out
//! by the quiet period. The value is released only once the deadline passes
//! with no newer event. Time is supplied by the caller (monotonic offset since
//! page load), which keeps the policy independent of any timer API.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    quiet_period: Duration,
    pending: Option<(Duration, T)>,
    fired: u64,
}

impl<T> Debouncer<T> {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
            fired: 0,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Record an event at `now`, superseding any pending one
    pub fn push(&mut self, now: Duration, value: T) {
        self.pending = Some((now + self.quiet_period, value));
    }

    /// When the pending value becomes due
    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if its quiet period has fully elapsed
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        match self.pending.take() {
            Some((deadline, value)) if now >= deadline => {
                self.fired += 1;
                Some(value)
            }
            other => {
                self.pending = other;
                None
            }
        }
    }

    /// Drop the pending value without firing
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Number of times a value was released
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_after_quiet_period() {
        let mut d = Debouncer::new(ms(200));
        d.push(ms(1000), 'a');
        assert_eq!(d.poll(ms(1199)), None);
        assert_eq!(d.poll(ms(1200)), Some('a'));
        assert_eq!(d.poll(ms(1500)), None);
        assert_eq!(d.fired(), 1);
    }

    #[test]
    fn test_burst_fires_once_with_last_value() {
        let mut d = Debouncer::new(ms(200));
        for i in 0..10u64 {
            d.push(ms(i * 50), i);
            // Every intermediate poll lands inside the quiet window
            assert_eq!(d.poll(ms(i * 50 + 10)), None);
        }
        assert_eq!(d.deadline(), Some(ms(450 + 200)));
        assert_eq!(d.poll(ms(649)), None);
        assert_eq!(d.poll(ms(650)), Some(9));
        assert_eq!(d.fired(), 1);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut d = Debouncer::new(ms(200));
        d.push(ms(0), 1);
        d.cancel();
        assert!(!d.is_pending());
        assert_eq!(d.poll(ms(10_000)), None);
        assert_eq!(d.fired(), 0);
    }
}
