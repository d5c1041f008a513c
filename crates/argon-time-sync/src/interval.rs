use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A non-negative span of virtual time, counted in integer ticks.
///
/// Intervals add and subtract with saturating semantics: addition saturates at
/// `u64::MAX`, subtraction at zero. There is no negative interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeInterval(u64);

impl TimeInterval {
    /// The zero-length interval.
    pub const EMPTY: TimeInterval = TimeInterval(0);

    pub const fn from_ticks(ticks: u64) -> Self {
        TimeInterval(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Add for TimeInterval {
    type Output = TimeInterval;

    fn add(self, rhs: TimeInterval) -> TimeInterval {
        TimeInterval(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for TimeInterval {
    fn add_assign(&mut self, rhs: TimeInterval) {
        *self = *self + rhs;
    }
}

impl Sub for TimeInterval {
    type Output = TimeInterval;

    fn sub(self, rhs: TimeInterval) -> TimeInterval {
        TimeInterval(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for TimeInterval {
    fn sub_assign(&mut self, rhs: TimeInterval) {
        *self = *self - rhs;
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
