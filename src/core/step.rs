use crate::{
    core::interval::Interval,
    quantity::{energy::MegawattHours, power::Megawatts, time::Hours},
};

/// Decimal places of the emitted energy, power, SoC and time values.
pub const ENERGY_DECIMALS: i32 = 6;

/// Decimal places of the emitted money values.
///
/// Like the energy values, they round half to even, so 0.125 PLN is emitted as 0.12.
pub const MONEY_DECIMALS: i32 = 2;

/// Single ledger row of a track run.
///
/// All the quantities are rounded on emission, except for [`Step::hours`]
/// which is kept exact because it is a part of the broker join key.
#[must_use]
#[derive(Clone, Debug, PartialEq)]
pub struct Step<D> {
    pub interval: Interval,
    pub hours: Hours,

    /// State of charge after the self-discharge, before the dispatch.
    pub soc_start: MegawattHours,

    pub soc_end: MegawattHours,

    pub charge_power: Megawatts,
    pub discharge_power: Megawatts,

    /// Energy that landed in the storage.
    pub charge_energy: MegawattHours,

    /// Energy delivered to the grid side.
    pub discharge_energy: MegawattHours,

    pub conversion_loss: MegawattHours,
    pub idle_loss: MegawattHours,
    pub total_loss: MegawattHours,

    pub gap_to_min_start: MegawattHours,
    pub gap_to_min_end: MegawattHours,
    pub time_below_min: Hours,

    pub hit_capacity_max: bool,
    pub hit_capacity_min: bool,

    /// Track-specific accounting.
    pub detail: D,
}

impl<D> Step<D> {
    /// Broker alignment key.
    pub const fn key(&self) -> (Interval, Hours) {
        (self.interval, self.hours)
    }
}
