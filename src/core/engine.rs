//! Shared fold of the track engines.

use crate::{
    core::{
        interval::Interval,
        params::TrackParams,
        series::{Point, step_lengths},
        step::{ENERGY_DECIMALS, Step},
        track::{Charge, Discharge, Track},
    },
    quantity::{Zero, energy::MegawattHours, time::Hours},
};

/// Per-step dispatch decision of a track.
pub trait Policy {
    type Detail;

    /// Decide and apply the dispatch for the step.
    ///
    /// The self-discharge has already been applied to the track.
    fn dispatch(&self, track: &mut Track, point: &Point, length: Hours) -> Dispatch<Self::Detail>;
}

/// Energy flows of a single step along with the track-specific accounting.
#[must_use]
pub struct Dispatch<D> {
    pub charge: Charge,
    pub discharge: Discharge,
    pub detail: D,
}

impl<D> Dispatch<D> {
    /// No dispatch at all, only the self-discharge applies.
    pub fn idle(detail: D) -> Self {
        Self { charge: Charge::default(), discharge: Discharge::default(), detail }
    }
}

/// Integrate the state of charge over the series.
///
/// This is a left fold with the [`Track`] as the accumulator: every step starts
/// from the exact (never rounded) state of charge the previous step ended with.
pub fn run<P: Policy>(points: &[Point], params: &TrackParams, policy: &P) -> Vec<Step<P::Detail>> {
    points
        .iter()
        .zip(step_lengths(points))
        .scan(Track::new(params), |track, (point, length)| {
            Some(simulate_step(track, point, length, policy))
        })
        .collect()
}

fn simulate_step<P: Policy>(
    track: &mut Track,
    point: &Point,
    length: Hours,
    policy: &P,
) -> Step<P::Detail> {
    let idle_loss = track.leak(length);

    let soc_start = track.soc();
    let soc_min = track.soc_min();
    let Dispatch { charge, discharge, detail } = policy.dispatch(track, point, length);
    track.clamp();
    let soc_end = track.soc();

    let conversion_loss = charge.conversion_loss() + discharge.conversion_loss();
    let round = |energy: MegawattHours| energy.round_to(ENERGY_DECIMALS);
    Step {
        interval: Interval::starting_at(point.ts_utc, length),
        hours: length,
        soc_start: round(soc_start),
        soc_end: round(soc_end),
        charge_power: (charge.stored / length).round_to(ENERGY_DECIMALS),
        discharge_power: (discharge.delivered / length).round_to(ENERGY_DECIMALS),
        charge_energy: round(charge.stored),
        discharge_energy: round(discharge.delivered),
        conversion_loss: round(conversion_loss),
        idle_loss: round(idle_loss),
        total_loss: round(conversion_loss + idle_loss),
        gap_to_min_start: round((soc_min - soc_start).max(MegawattHours::ZERO)),
        gap_to_min_end: round((soc_min - soc_end).max(MegawattHours::ZERO)),
        time_below_min: time_below_min(soc_start, soc_end, soc_min, length)
            .round_to(ENERGY_DECIMALS),
        hit_capacity_max: charge.hit_max,
        hit_capacity_min: discharge.hit_min,
        detail,
    }
}

/// Approximate the time spent below the minimum.
///
/// The whole step counts when both ends are below the minimum, half of it when only one is.
fn time_below_min(
    soc_start: MegawattHours,
    soc_end: MegawattHours,
    soc_min: MegawattHours,
    length: Hours,
) -> Hours {
    match (soc_start < soc_min, soc_end < soc_min) {
        (true, true) => length,
        (true, false) | (false, true) => length * 0.5,
        (false, false) => Hours::ZERO,
    }
}
