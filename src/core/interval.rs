use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Utc};

use crate::quantity::time::Hours;

/// Ledger step interval.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[must_use]
pub struct Interval {
    /// Inclusive.
    pub start: DateTime<Utc>,

    /// Exclusive.
    pub end: DateTime<Utc>,
}

impl Debug for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Interval {
    /// Build the interval from its start and a (possibly fractional) length.
    pub fn starting_at(start: DateTime<Utc>, length: Hours) -> Self {
        Self { start, end: start + chrono::TimeDelta::from(length) }
    }
}
