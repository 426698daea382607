//! Input time series and step-length derivation.

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::quantity::{energy::MegawattHours, price::MegawattHourPrice, time::Hours};

/// Steps shorter than this are stretched to it, so that power never divides by zero.
pub const MIN_STEP: Hours = Hours(1e-9);

/// Single input point.
#[derive(Copy, Clone, Debug, PartialEq, serde::Deserialize)]
pub struct Point {
    pub ts_utc: DateTime<Utc>,

    /// Net load imbalance within the step: positive is surplus to absorb, negative is deficit to cover.
    pub delta_brutto: MegawattHours,

    /// Spot price, if known.
    pub price_pln_mwh: Option<MegawattHourPrice>,
}

/// Calculate the length of each step.
///
/// A step lasts until the next point starts. The trailing point has no successor,
/// so it takes the median of all the other step lengths, or one hour if it is the only point.
pub fn step_lengths(points: &[Point]) -> Vec<Hours> {
    let mut lengths = points
        .iter()
        .tuple_windows()
        .map(|(current, next)| Hours::from(next.ts_utc - current.ts_utc))
        .collect_vec();
    if !points.is_empty() {
        lengths.push(median(&lengths).unwrap_or(Hours::ONE));
    }
    lengths.into_iter().map(|length| length.max(MIN_STEP)).collect()
}

/// Median with the mean of the two middle elements for even lengths.
fn median(values: &[Hours]) -> Option<Hours> {
    let sorted = values.iter().copied().sorted().collect_vec();
    let middle = sorted.len() / 2;
    match sorted.len() {
        0 => None,
        n if n % 2 == 1 => Some(sorted[middle]),
        _ => Some((sorted[middle - 1] + sorted[middle]) / 2.0),
    }
}

#[cfg(test)]
pub mod tests {
    use chrono::TimeZone;

    use super::*;

    /// Build an hourly series starting at midnight, January 1st 2025.
    pub fn hourly(deltas_and_prices: &[(f64, Option<f64>)]) -> Vec<Point> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        deltas_and_prices
            .iter()
            .zip(0..)
            .map(|((delta, price), hour)| Point {
                ts_utc: start + chrono::TimeDelta::hours(hour),
                delta_brutto: MegawattHours(*delta),
                price_pln_mwh: price.map(MegawattHourPrice),
            })
            .collect()
    }

    fn at(hour: u32, minute: u32) -> Point {
        Point {
            ts_utc: Utc.with_ymd_and_hms(2025, 1, 1, hour, minute, 0).unwrap(),
            delta_brutto: MegawattHours(0.0),
            price_pln_mwh: None,
        }
    }

    #[test]
    fn test_empty() {
        assert!(step_lengths(&[]).is_empty());
    }

    #[test]
    fn test_single_point_defaults_to_one_hour() {
        assert_eq!(step_lengths(&[at(0, 0)]), vec![Hours(1.0)]);
    }

    #[test]
    fn test_trailing_step_takes_median() {
        let points = [at(0, 0), at(0, 15), at(0, 30), at(1, 30), at(1, 45)];
        assert_eq!(
            step_lengths(&points),
            vec![Hours(0.25), Hours(0.25), Hours(1.0), Hours(0.25), Hours(0.25)],
        );
    }

    #[test]
    fn test_even_median_averages_middle() {
        let points = [at(0, 0), at(0, 30), at(1, 30), at(2, 0)];
        // Lengths 0.5, 1.0, 0.5 → median 0.5.
        assert_eq!(step_lengths(&points)[3], Hours(0.5));

        let points = [at(0, 0), at(0, 30), at(1, 30)];
        // Lengths 0.5, 1.0 → median 0.75.
        assert_eq!(step_lengths(&points)[2], Hours(0.75));
    }

    #[test]
    fn test_zero_length_is_floored() {
        let points = [at(0, 0), at(0, 0)];
        assert_eq!(step_lengths(&points)[0], MIN_STEP);
    }
}
