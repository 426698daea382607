//! Local load compensation track.
//!
//! A surplus (`delta_brutto > 0`) is absorbed by charging, a deficit is covered by discharging.

use crate::{
    core::{
        engine::{self, Dispatch, Policy},
        params::TrackParams,
        series::Point,
        step::{ENERGY_DECIMALS, Step},
        summary::TrackSummary,
        track::Track,
    },
    prelude::*,
    quantity::{Zero, energy::MegawattHours, time::Hours},
};

/// Load compensation accounting of a single step.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct OzeDetail {
    /// Energy the track could not handle at all.
    ///
    /// On the discharging side, this is the part of the deficit left uncovered.
    /// On the charging side, this is the whole surplus when the track was already full.
    pub spill_surplus: MegawattHours,

    /// Part of the surplus left unabsorbed because of the power cap or the headroom.
    pub unmet_deficit: MegawattHours,
}

pub type OzeStep = Step<OzeDetail>;

/// Compensate the net load imbalance.
#[derive(Copy, Clone)]
pub struct Compensation;

impl Policy for Compensation {
    type Detail = OzeDetail;

    fn dispatch(&self, track: &mut Track, point: &Point, length: Hours) -> Dispatch<OzeDetail> {
        let need = point.delta_brutto;
        if need > MegawattHours::ZERO {
            let charge = track.charge(Some(need), length);
            let detail = if charge.blocked {
                OzeDetail { spill_surplus: need, unmet_deficit: MegawattHours::ZERO }
            } else {
                OzeDetail {
                    spill_surplus: MegawattHours::ZERO,
                    unmet_deficit: (need - charge.drawn).max(MegawattHours::ZERO),
                }
            };
            Dispatch { charge, discharge: Default::default(), detail: detail.rounded() }
        } else if need < MegawattHours::ZERO {
            let need = -need;
            let discharge = track.discharge(Some(need), length);
            let spill_surplus = if discharge.blocked {
                need
            } else {
                (need - discharge.delivered).max(MegawattHours::ZERO)
            };
            let detail = OzeDetail { spill_surplus, unmet_deficit: MegawattHours::ZERO };
            Dispatch { charge: Default::default(), discharge, detail: detail.rounded() }
        } else {
            Dispatch::idle(OzeDetail::default())
        }
    }
}

impl OzeDetail {
    fn rounded(self) -> Self {
        Self {
            spill_surplus: self.spill_surplus.round_to(ENERGY_DECIMALS),
            unmet_deficit: self.unmet_deficit.round_to(ENERGY_DECIMALS),
        }
    }
}

/// Build the load compensation ledger.
#[instrument(skip_all, fields(n_points = points.len()))]
pub fn compute(points: &[Point], params: &TrackParams) -> Vec<OzeStep> {
    let steps = engine::run(points, params, &Compensation);
    let summary = TrackSummary::from(steps.as_slice());
    info!(
        n_rows = summary.n_steps,
        charge = %summary.charge,
        discharge = %summary.discharge,
        conversion_loss = %summary.conversion_loss,
        idle_loss = %summary.idle_loss,
        spill = %spill_total(&steps),
        unmet = %unmet_total(&steps),
        "computed OZE ledger",
    );
    steps
}

pub fn spill_total(steps: &[OzeStep]) -> MegawattHours {
    steps.iter().map(|step| step.detail.spill_surplus).sum()
}

pub fn unmet_total(steps: &[OzeStep]) -> MegawattHours {
    steps.iter().map(|step| step.detail.unmet_deficit).sum()
}
