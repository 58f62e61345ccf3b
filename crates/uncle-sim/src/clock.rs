//! Simulated time

use std::{fmt::Display, ops::Add, time::Duration};

/// A point in simulated time, measured from the start of a simulation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub fn zero() -> Self {
        Self(Duration::ZERO)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl From<Duration> for Timestamp {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

/// Saturates at the largest representable time, which a run never reaches.
impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0.saturating_add(rhs))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

/// Discrete clock which advances in fixed steps.
///
/// The current time is always `tick * timestep`, computed from integer
/// nanoseconds so that long runs don't accumulate rounding drift.
#[derive(Debug, Clone)]
pub struct Clock {
    timestep: Duration,
    tick: u64,
}

impl Clock {
    pub fn new(timestep: Duration) -> Self {
        Self { timestep, tick: 0 }
    }

    /// Number of steps taken so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn timestep(&self) -> Duration {
        self.timestep
    }

    pub fn now(&self) -> Timestamp {
        let nanos = self.timestep.as_nanos() * self.tick as u128;
        let secs = (nanos / 1_000_000_000) as u64;
        let subsec = (nanos % 1_000_000_000) as u32;

        Timestamp(Duration::new(secs, subsec))
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Clock, Timestamp};

    #[test]
    fn clock_advances_in_fixed_steps() {
        let mut clock = Clock::new(Duration::from_millis(10));
        assert_eq!(clock.now(), Timestamp::zero());

        for _ in 0..6000 {
            clock.advance();
        }

        assert_eq!(clock.tick(), 6000);
        assert_eq!(clock.now(), Duration::from_secs(60).into());
    }

    #[test]
    fn timestamp_display() {
        let t = Timestamp::from(Duration::from_millis(12_340));
        assert_eq!(t.to_string(), "12.340s");
    }

    #[test]
    fn adding_huge_delays_saturates() {
        let t = Timestamp::from(Duration::from_secs(60));
        let never = Timestamp::from(Duration::MAX);

        assert_eq!(t + Duration::MAX, never);
        assert_eq!(never + Duration::from_nanos(1), never);
        assert!(t + Duration::from_secs(1) < never);
    }
}
