use std::time::{Duration, Instant};

/// A recurring task deadline on the cooperative loop.
///
/// Disarmed intervals are never due. Firing re-arms one period after the
/// deadline, falling back to `now + period` if the loop fell behind, so a
/// stalled tick never causes a burst of catch-up runs.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next: Option<Instant>,
}

impl Interval {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    /// Arm so the first run is due at `first`.
    pub fn arm_at(&mut self, first: Instant) {
        self.next = Some(first);
    }

    pub fn disarm(&mut self) {
        self.next = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Consume a due run and schedule the next one.
    pub fn fire(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.next else {
            return false;
        };
        if now < deadline {
            return false;
        }
        let next = deadline + self.period;
        self.next = Some(if next > now { next } else { now + self.period });
        true
    }
}

/// Sleep until the earliest deadline, but never longer than `cap`.
pub fn sleep_until(deadlines: impl IntoIterator<Item = Option<Instant>>, cap: Duration) {
    let now = Instant::now();
    let wait = deadlines
        .into_iter()
        .flatten()
        .map(|t| t.saturating_duration_since(now))
        .min()
        .unwrap_or(cap)
        .min(cap);
    if !wait.is_zero() {
        spin_sleep::sleep(wait);
    }
}
