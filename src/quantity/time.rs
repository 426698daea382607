use chrono::TimeDelta;

quantity!(Hours, via: f64, suffix: "h", precision: 2);

impl Hours {
    pub const ONE: Self = Self(1.0);
}

impl From<TimeDelta> for Hours {
    fn from(time_delta: TimeDelta) -> Self {
        Self(time_delta.as_seconds_f64() / 3600.0)
    }
}

impl From<Hours> for TimeDelta {
    /// Nanosecond-precision duration.
    #[expect(clippy::cast_possible_truncation)]
    fn from(hours: Hours) -> Self {
        Self::nanoseconds((hours.0 * 3_600_000_000_000.0).round() as i64)
    }
}
