//! Power brokering between the tracks.
//!
//! The broker reconciles the power each track dispatched against the combined rated power
//! and the contracted grid connection, with the load compensation track served first.
//! It never feeds back into the engines, so the allocation may fall below what a track
//! actually dispatched: the difference is reported as curtailment.

use itertools::{EitherOrBoth, Itertools};

use crate::{
    core::{
        arbi::ArbiStep,
        interval::Interval,
        oze::OzeStep,
        params::Params,
        step::ENERGY_DECIMALS,
    },
    prelude::*,
    quantity::{Zero, power::Megawatts, time::Hours},
};

/// Power requested and allocated in one direction.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Allocation {
    pub requested_oze: Megawatts,
    pub requested_arbi: Megawatts,
    pub allocated_oze: Megawatts,
    pub allocated_arbi: Megawatts,
}

impl Allocation {
    /// Serve the load compensation track first, then give the rest to the arbitrage.
    pub fn with_priority(requested_oze: Megawatts, requested_arbi: Megawatts, cap: Megawatts) -> Self {
        let allocated_oze = requested_oze.min(cap);
        let remaining = (cap - allocated_oze).max(Megawatts::ZERO);
        Self {
            requested_oze,
            requested_arbi,
            allocated_oze,
            allocated_arbi: requested_arbi.min(remaining),
        }
    }

    pub fn curtailed_oze(&self) -> Megawatts {
        (self.requested_oze - self.allocated_oze).max(Megawatts::ZERO)
    }

    pub fn curtailed_arbi(&self) -> Megawatts {
        (self.requested_arbi - self.allocated_arbi).max(Megawatts::ZERO)
    }

    fn rounded(self) -> Self {
        Self {
            requested_oze: self.requested_oze.round_to(ENERGY_DECIMALS),
            requested_arbi: self.requested_arbi.round_to(ENERGY_DECIMALS),
            allocated_oze: self.allocated_oze.round_to(ENERGY_DECIMALS),
            allocated_arbi: self.allocated_arbi.round_to(ENERGY_DECIMALS),
        }
    }
}

/// Single broker ledger row.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct BrokerStep {
    pub interval: Interval,
    pub hours: Hours,
    pub charge: Allocation,
    pub discharge: Allocation,

    /// Combined rated charging power of both tracks.
    pub charge_cap: Megawatts,

    /// Combined rated discharging power of both tracks.
    pub discharge_cap: Megawatts,

    pub contracted_power: Option<Megawatts>,

    /// Explains any curtailment.
    pub note: Option<String>,
}

impl BrokerStep {
    pub fn curtailed(&self) -> Megawatts {
        self.charge.curtailed_oze()
            + self.charge.curtailed_arbi()
            + self.discharge.curtailed_oze()
            + self.discharge.curtailed_arbi()
    }
}

/// Broker ledger along with the join anomalies.
#[must_use]
#[derive(Clone, Debug, Default)]
pub struct BrokerLedger {
    pub steps: Vec<BrokerStep>,

    /// Load compensation rows without an arbitrage counterpart.
    pub n_unmatched_oze: usize,

    /// Arbitrage rows without a load compensation counterpart.
    pub n_unmatched_arbi: usize,
}

impl BrokerLedger {
    /// Both ledgers shared the same time grid.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.n_unmatched_oze == 0 && self.n_unmatched_arbi == 0
    }

    pub fn total_curtailed(&self) -> Megawatts {
        self.steps.iter().map(BrokerStep::curtailed).sum()
    }
}

/// Effective caps of a run.
#[derive(Copy, Clone)]
struct Caps {
    charge: Megawatts,
    discharge: Megawatts,
    contracted: Option<Megawatts>,
}

impl Caps {
    fn new(params: &Params) -> Self {
        Self {
            charge: params.oze.charge_power_cap + params.arbi.charge_power_cap,
            discharge: params.oze.discharge_power_cap + params.arbi.discharge_power_cap,
            contracted: params.effective_contracted_power(),
        }
    }

    /// The contract is a single bidirectional limit, so it clamps both directions alike.
    fn limit(&self, rated: Megawatts) -> Megawatts {
        self.contracted.map_or(rated, |contracted| rated.min(contracted))
    }

    fn binding_limit(&self, rated: Megawatts) -> &'static str {
        match self.contracted {
            Some(contracted) if contracted < rated => "contracted power",
            _ => "rated power",
        }
    }
}

/// Reconcile both track ledgers.
///
/// Rows are joined on `(interval, step length)`. Only the common rows make it into the ledger,
/// the rest is counted in [`BrokerLedger::n_unmatched_oze`] and [`BrokerLedger::n_unmatched_arbi`].
#[instrument(skip_all, fields(n_oze = oze.len(), n_arbi = arbi.len()))]
pub fn compute(oze: &[OzeStep], arbi: &[ArbiStep], params: &Params) -> BrokerLedger {
    if oze.is_empty() || arbi.is_empty() {
        return BrokerLedger::default();
    }
    let caps = Caps::new(params);
    let mut ledger = BrokerLedger::default();

    for pair in oze.iter().merge_join_by(arbi, |oze, arbi| oze.key().cmp(&arbi.key())) {
        match pair {
            EitherOrBoth::Both(oze, arbi) => {
                ledger.steps.push(allocate(oze, arbi, caps));
            }
            EitherOrBoth::Left(_) => {
                ledger.n_unmatched_oze += 1;
            }
            EitherOrBoth::Right(_) => {
                ledger.n_unmatched_arbi += 1;
            }
        }
    }

    if !ledger.is_consistent() {
        warn!(
            n_unmatched_oze = ledger.n_unmatched_oze,
            n_unmatched_arbi = ledger.n_unmatched_arbi,
            "track ledgers do not share the same time grid, the broker ledger is shortened",
        );
    }
    info!(
        n_rows = ledger.steps.len(),
        charge_cap = %caps.charge,
        discharge_cap = %caps.discharge,
        contracted_power = ?caps.contracted,
        total_curtailed = %ledger.total_curtailed(),
        "computed broker ledger",
    );
    ledger
}

fn allocate(oze: &OzeStep, arbi: &ArbiStep, caps: Caps) -> BrokerStep {
    let charge = Allocation::with_priority(
        oze.charge_power,
        arbi.charge_power,
        caps.limit(caps.charge),
    )
    .rounded();
    let discharge = Allocation::with_priority(
        oze.discharge_power,
        arbi.discharge_power,
        caps.limit(caps.discharge),
    )
    .rounded();
    let note = describe_curtailment(&charge, &discharge, caps);
    BrokerStep {
        interval: oze.interval,
        hours: oze.hours,
        charge,
        discharge,
        charge_cap: caps.charge,
        discharge_cap: caps.discharge,
        contracted_power: caps.contracted,
        note,
    }
}

fn describe_curtailment(charge: &Allocation, discharge: &Allocation, caps: Caps) -> Option<String> {
    let note = [("charge", charge, caps.charge), ("discharge", discharge, caps.discharge)]
        .into_iter()
        .flat_map(|(direction, allocation, rated)| {
            [("OZE", allocation.curtailed_oze()), ("ARBI", allocation.curtailed_arbi())]
                .into_iter()
                .filter(|(_, curtailed)| *curtailed > Megawatts::ZERO)
                .map(move |(track, curtailed)| {
                    format!(
                        "{track} {direction} curtailed by {curtailed} ({})",
                        caps.binding_limit(rated),
                    )
                })
        })
        .join("; ");
    (!note.is_empty()).then_some(note)
}
