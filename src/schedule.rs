//! When things happen during a load test.
//!
//! All timers go through [`tokio::time`], so the whole schedule can be driven by a
//! paused clock in tests.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Spreads virtual user launches evenly over the ramp-up time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RampUpSchedule {
    users: usize,
    interval: Duration,
}
impl RampUpSchedule {
    /// One launch every `ramp_up_time / users`, the first one immediately.
    ///
    /// # Example
    /// ```rust
    /// use gosling::schedule::RampUpSchedule;
    /// use std::time::Duration;
    ///
    /// let schedule = RampUpSchedule::new(4, Duration::from_millis(4_000));
    /// assert_eq!(schedule.interval(), Duration::from_millis(1_000));
    /// assert_eq!(schedule.offset(3), Some(Duration::from_millis(3_000)));
    /// assert_eq!(schedule.offset(4), None);
    /// ```
    pub fn new(users: usize, ramp_up_time: Duration) -> Self {
        let interval = match u32::try_from(users) {
            Ok(0) => Duration::ZERO,
            Ok(users) => ramp_up_time / users,
            // More users than nanoseconds to spread them over.
            Err(_) => Duration::ZERO,
        };
        RampUpSchedule { users, interval }
    }

    /// How many virtual users are launched.
    pub fn users(&self) -> usize {
        self.users
    }

    /// Time between two launches.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the `index`th virtual user (zero-based) is launched, relative to the start of
    /// the load test. `None` once every virtual user has been scheduled.
    pub fn offset(&self, index: usize) -> Option<Duration> {
        if index >= self.users {
            return None;
        }
        let index = u32::try_from(index).ok()?;
        self.interval.checked_mul(index)
    }

    /// The `index`th launch as an absolute deadline.
    pub fn deadline(&self, started: Instant, index: usize) -> Option<Instant> {
        self.offset(index).map(|offset| started + offset)
    }
}

/// Sleep until `deadline`, or forever if there is none.
///
/// Used in `select!` loops where a timer may or may not be armed.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// A uniformly random duration between `min` and `max`, both inclusive, at millisecond
/// precision.
pub fn think_time(min: Duration, max: Duration) -> Duration {
    let min_ms = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
}
