//! One full recomputation: series → both tracks → broker → ledgers.

use std::path::Path;

use crate::{
    core::{
        arbi::{self, Arbitrage},
        broker::{self, BrokerLedger},
        oze,
        params::Params,
        summary::TrackSummary,
    },
    prelude::*,
    quantity::{currency::Zlotys, energy::MegawattHours, power::Megawatts},
    resolver,
    store::Store,
};

/// Outcome of a recomputation.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RunReport {
    pub oze: TrackSummary,
    pub spill_surplus: MegawattHours,
    pub unmet_deficit: MegawattHours,

    pub arbi: TrackSummary,
    pub net_value: Zlotys,

    pub n_broker_rows: usize,
    pub n_curtailed_rows: usize,
    pub total_curtailed: Megawatts,
    pub n_unmatched_oze: usize,
    pub n_unmatched_arbi: usize,
}

impl RunReport {
    fn new(oze: &[oze::OzeStep], arbi: &[arbi::ArbiStep], broker: &BrokerLedger) -> Self {
        Self {
            oze: TrackSummary::from(oze),
            spill_surplus: oze::spill_total(oze),
            unmet_deficit: oze::unmet_total(oze),
            arbi: TrackSummary::from(arbi),
            net_value: arbi::net_value_total(arbi),
            n_broker_rows: broker.steps.len(),
            n_curtailed_rows: broker.steps.iter().filter(|step| step.note.is_some()).count(),
            total_curtailed: broker.total_curtailed(),
            n_unmatched_oze: broker.n_unmatched_oze,
            n_unmatched_arbi: broker.n_unmatched_arbi,
        }
    }
}

/// Recompute all ledgers from the stored series.
///
/// Both tracks are independent from each other, so they run in parallel.
/// The ledgers get replaced only after everything has been computed.
#[instrument(skip_all)]
pub fn recompute(store: &Store, params: &Params) -> Result<RunReport> {
    params.validate()?;
    let points = store.load_series()?;
    let arbitrage = Arbitrage::builder()
        .maybe_price_low(params.arbi_price_low)
        .maybe_price_high(params.arbi_price_high)
        .build();

    let (oze, arbi) = rayon::join(
        || oze::compute(&points, &params.oze),
        || arbi::compute(&points, &params.arbi, &arbitrage),
    );
    let broker = broker::compute(&oze, &arbi, params);
    store.replace_ledgers(&oze, &arbi, &broker.steps)?;

    let report = RunReport::new(&oze, &arbi, &broker);
    info!(
        n_points = points.len(),
        oze_charge = %report.oze.charge,
        oze_discharge = %report.oze.discharge,
        spill_surplus = %report.spill_surplus,
        unmet_deficit = %report.unmet_deficit,
        arbi_charge = %report.arbi.charge,
        arbi_discharge = %report.arbi.discharge,
        net_value = %report.net_value,
        n_curtailed_rows = report.n_curtailed_rows,
        "recomputed",
    );
    Ok(report)
}

/// Resolve the parameters and recompute.
pub fn rebuild(store: &Store, params_path: &Path) -> Result<RunReport> {
    let params = resolver::load(params_path).context("failed to resolve the parameters")?;
    recompute(store, &params)
}
