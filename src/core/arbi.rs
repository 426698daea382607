//! Price arbitrage track.
//!
//! Charges at or below the low price threshold, discharges at or above the high one, idles otherwise.

use crate::{
    core::{
        engine::{self, Dispatch, Policy},
        params::TrackParams,
        series::Point,
        step::{MONEY_DECIMALS, Step},
        summary::TrackSummary,
        track::Track,
    },
    prelude::*,
    quantity::{Zero, currency::Zlotys, price::MegawattHourPrice, time::Hours},
};

/// Financial accounting of a single step.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ArbiDetail {
    pub price: Option<MegawattHourPrice>,

    /// Paid for the grid-side energy drawn while charging.
    pub cost: Zlotys,

    /// Earned for the grid-side energy delivered while discharging.
    pub revenue: Zlotys,
}

impl ArbiDetail {
    pub fn net_value(&self) -> Zlotys {
        (self.revenue - self.cost).round_to(MONEY_DECIMALS)
    }
}

pub type ArbiStep = Step<ArbiDetail>;

/// Price thresholds of the arbitrage.
///
/// Without both thresholds, the track never dispatches.
#[derive(Copy, Clone, Debug, bon::Builder)]
pub struct Arbitrage {
    pub price_low: Option<MegawattHourPrice>,
    pub price_high: Option<MegawattHourPrice>,
}

impl Policy for Arbitrage {
    type Detail = ArbiDetail;

    fn dispatch(&self, track: &mut Track, point: &Point, length: Hours) -> Dispatch<ArbiDetail> {
        let idle = ArbiDetail { price: point.price_pln_mwh, ..ArbiDetail::default() };
        let (Some(price), Some(price_low), Some(price_high)) =
            (point.price_pln_mwh, self.price_low, self.price_high)
        else {
            return Dispatch::idle(idle);
        };
        if price <= price_low {
            let charge = track.charge(None, length);
            let cost = (charge.drawn * price).round_to(MONEY_DECIMALS);
            Dispatch { charge, discharge: Default::default(), detail: ArbiDetail { cost, ..idle } }
        } else if price >= price_high {
            let discharge = track.discharge(None, length);
            let revenue = (discharge.delivered * price).round_to(MONEY_DECIMALS);
            Dispatch { charge: Default::default(), discharge, detail: ArbiDetail { revenue, ..idle } }
        } else {
            Dispatch::idle(idle)
        }
    }
}

/// Build the arbitrage ledger.
#[instrument(skip_all, fields(n_points = points.len()))]
pub fn compute(points: &[Point], params: &TrackParams, arbitrage: &Arbitrage) -> Vec<ArbiStep> {
    if arbitrage.price_low.is_none() || arbitrage.price_high.is_none() {
        warn!("arbitrage price thresholds are not set, the track stays idle");
    }
    let steps = engine::run(points, params, arbitrage);
    let summary = TrackSummary::from(steps.as_slice());
    info!(
        n_rows = summary.n_steps,
        charge = %summary.charge,
        discharge = %summary.discharge,
        conversion_loss = %summary.conversion_loss,
        idle_loss = %summary.idle_loss,
        net_value = %net_value_total(&steps),
        "computed ARBI ledger",
    );
    steps
}

pub fn net_value_total(steps: &[ArbiStep]) -> Zlotys {
    steps.iter().map(|step| step.detail.net_value()).sum::<Zlotys>().round_to(MONEY_DECIMALS)
}
