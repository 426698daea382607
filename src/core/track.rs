use crate::{
    core::params::TrackParams,
    quantity::{Zero, energy::MegawattHours, power::Megawatts, time::Hours},
};

/// Headroom below this is treated as exhausted.
const HEADROOM_EPSILON: MegawattHours = MegawattHours(1e-12);

/// Efficiencies are floored to this before dividing by them.
const MIN_EFFICIENCY: f64 = 1e-12;

/// State-of-charge owner of a single track.
///
/// Lives for exactly one run: created from the initial SoC and dropped with the ledger.
#[derive(Copy, Clone, Debug)]
pub struct Track {
    /// Current state of charge, never rounded.
    soc: MegawattHours,

    capacity: MegawattHours,
    soc_min: MegawattHours,
    soc_max: MegawattHours,
    charge_power_cap: Megawatts,
    discharge_power_cap: Megawatts,
    charge_efficiency: f64,
    discharge_efficiency: f64,
    self_discharge_per_hour: f64,
}

/// Outcome of a charging attempt.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Charge {
    /// Grid-side energy drawn.
    pub drawn: MegawattHours,

    /// Energy that actually landed in the storage.
    pub stored: MegawattHours,

    /// The headroom was the binding constraint.
    pub hit_max: bool,

    /// There was no headroom at all, nothing could be stored.
    pub blocked: bool,
}

impl Charge {
    pub fn conversion_loss(&self) -> MegawattHours {
        (self.drawn - self.stored).max(MegawattHours::ZERO)
    }
}

/// Outcome of a discharging attempt.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Discharge {
    /// Energy taken out of the storage.
    pub taken: MegawattHours,

    /// Grid-side energy delivered.
    pub delivered: MegawattHours,

    /// The available energy above the minimum was the binding constraint.
    pub hit_min: bool,

    /// Nothing was available above the minimum.
    pub blocked: bool,
}

impl Discharge {
    pub fn conversion_loss(&self) -> MegawattHours {
        (self.taken - self.delivered).max(MegawattHours::ZERO)
    }
}

impl Track {
    pub fn new(params: &TrackParams) -> Self {
        Self {
            soc: params.soc_init.clamp(params.soc_min, params.soc_max.max(params.soc_min)),
            capacity: params.capacity,
            soc_min: params.soc_min,
            soc_max: params.soc_max,
            charge_power_cap: params.charge_power_cap,
            discharge_power_cap: params.discharge_power_cap,
            charge_efficiency: params.charge_efficiency,
            discharge_efficiency: params.discharge_efficiency,
            self_discharge_per_hour: params.self_discharge_per_hour,
        }
    }

    pub const fn soc(&self) -> MegawattHours {
        self.soc
    }

    pub const fn soc_min(&self) -> MegawattHours {
        self.soc_min
    }

    /// Leak the self-discharge for the step, never below the minimum.
    ///
    /// # Returns
    ///
    /// The leaked energy.
    pub fn leak(&mut self, for_: Hours) -> MegawattHours {
        if self.self_discharge_per_hour <= 0.0 || self.soc <= self.soc_min {
            return MegawattHours::ZERO;
        }
        let leak = (self.capacity * (self.self_discharge_per_hour * for_.0))
            .min(self.soc - self.soc_min);
        self.soc -= leak;
        leak
    }

    /// Charge as much as the headroom and the power cap allow.
    ///
    /// When `demand` is set, the grid-side draw never exceeds it.
    pub fn charge(&mut self, demand: Option<MegawattHours>, for_: Hours) -> Charge {
        let headroom = self.soc_max - self.soc;
        if headroom <= HEADROOM_EPSILON {
            return Charge { hit_max: true, blocked: true, ..Charge::default() };
        }
        let max_stored = headroom.min(self.charge_power_cap * for_);
        let max_drawn = max_stored / self.charge_efficiency.max(MIN_EFFICIENCY);
        let drawn = demand.map_or(max_drawn, |demand| max_drawn.min(demand));
        let stored = drawn * self.charge_efficiency;
        self.soc += stored;
        Charge { drawn, stored, hit_max: max_stored >= headroom - HEADROOM_EPSILON, blocked: false }
    }

    /// Discharge as much as the energy above the minimum and the power cap allow.
    ///
    /// When `demand` is set, the grid-side delivery never exceeds it.
    pub fn discharge(&mut self, demand: Option<MegawattHours>, for_: Hours) -> Discharge {
        let available = self.soc - self.soc_min;
        if available <= HEADROOM_EPSILON {
            return Discharge { hit_min: true, blocked: true, ..Discharge::default() };
        }
        let max_taken = available.min(self.discharge_power_cap * for_);
        let max_delivered = max_taken * self.discharge_efficiency;
        let delivered = demand.map_or(max_delivered, |demand| max_delivered.min(demand));
        let taken = delivered / self.discharge_efficiency.max(MIN_EFFICIENCY);
        self.soc -= taken;
        Discharge {
            taken,
            delivered,
            hit_min: max_taken >= available - HEADROOM_EPSILON,
            blocked: false,
        }
    }

    /// Pull the state of charge back into the allowed range after floating-point drift.
    pub fn clamp(&mut self) {
        self.soc = self.soc.clamp(self.soc_min, self.soc_max.max(self.soc_min));
    }
}
