//! Validated storage parameters handed to the engines.

use bon::Builder;

use crate::{
    prelude::*,
    quantity::{Zero, energy::MegawattHours, power::Megawatts, price::MegawattHourPrice},
};

/// Whole-storage parameters, before the capacity is split between the tracks.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct BessParams {
    pub capacity: MegawattHours,
    pub charge_power_cap: Megawatts,
    pub discharge_power_cap: Megawatts,

    /// Charging efficiency, `0..=1`.
    pub charge_efficiency: f64,

    /// Discharging efficiency, `0..=1`.
    pub discharge_efficiency: f64,

    /// Fraction of the total capacity leaked per hour.
    #[builder(default)]
    pub self_discharge_per_hour: f64,

    pub soc_min: MegawattHours,
    pub soc_max: MegawattHours,
}

/// Parameters of a single logical sub-reservoir.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct TrackParams {
    pub capacity: MegawattHours,
    pub charge_power_cap: Megawatts,
    pub discharge_power_cap: Megawatts,

    /// Charging efficiency, `0..=1`.
    pub charge_efficiency: f64,

    /// Discharging efficiency, `0..=1`.
    pub discharge_efficiency: f64,

    /// Fraction of the track capacity leaked per hour.
    #[builder(default)]
    pub self_discharge_per_hour: f64,

    #[builder(default)]
    pub soc_min: MegawattHours,

    pub soc_max: MegawattHours,

    #[builder(default)]
    pub soc_init: MegawattHours,
}

/// Complete parameter set of one run.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct Params {
    pub bess: BessParams,

    /// Share of the capacity dedicated to the load compensation track, `0..=1`.
    pub share_oze: f64,

    pub oze: TrackParams,
    pub arbi: TrackParams,

    /// Grid connection limit applying to both directions.
    pub contracted_power: Option<Megawatts>,

    /// Charge the arbitrage track at or below this price.
    pub arbi_price_low: Option<MegawattHourPrice>,

    /// Discharge the arbitrage track at or above this price.
    pub arbi_price_high: Option<MegawattHourPrice>,
}

impl Params {
    /// Check the input shape before any engine runs.
    pub fn validate(&self) -> Result {
        let bess = &self.bess;
        ensure!(
            bess.capacity.is_finite() && bess.capacity > MegawattHours::ZERO,
            "storage capacity must be positive, got {}",
            bess.capacity,
        );
        ensure!(
            (0.0..=1.0).contains(&self.share_oze),
            "OZE share must be within 0..=1, got {}",
            self.share_oze,
        );
        ensure!(
            MegawattHours::ZERO <= bess.soc_min
                && bess.soc_min < bess.soc_max
                && bess.soc_max <= bess.capacity,
            "storage SoC bounds must satisfy 0 ≤ min < max ≤ capacity, got {}..{} of {}",
            bess.soc_min,
            bess.soc_max,
            bess.capacity,
        );
        self.oze.validate().context("invalid OZE track parameters")?;
        self.arbi.validate().context("invalid ARBI track parameters")?;
        if let Some(contracted_power) = self.contracted_power {
            ensure!(contracted_power.is_finite(), "contracted power must be finite");
        }
        for price in [self.arbi_price_low, self.arbi_price_high].into_iter().flatten() {
            ensure!(price.is_finite(), "arbitrage price thresholds must be finite");
        }
        Ok(())
    }

    /// Contracted power, if it actually limits anything.
    pub fn effective_contracted_power(&self) -> Option<Megawatts> {
        self.contracted_power.filter(|power| *power > Megawatts::ZERO)
    }
}

impl TrackParams {
    pub fn validate(&self) -> Result {
        for (name, value) in [
            ("capacity", self.capacity),
            ("SoC minimum", self.soc_min),
            ("SoC maximum", self.soc_max),
            ("initial SoC", self.soc_init),
        ] {
            ensure!(value.is_finite(), "{name} must be finite");
        }
        ensure!(self.capacity >= MegawattHours::ZERO, "capacity must not be negative");
        for (name, power) in
            [("charging", self.charge_power_cap), ("discharging", self.discharge_power_cap)]
        {
            ensure!(
                power.is_finite() && power >= Megawatts::ZERO,
                "{name} power cap must be non-negative, got {power}",
            );
        }
        for (name, efficiency) in
            [("charging", self.charge_efficiency), ("discharging", self.discharge_efficiency)]
        {
            ensure!(
                (0.0..=1.0).contains(&efficiency),
                "{name} efficiency must be within 0..=1, got {efficiency}",
            );
        }
        ensure!(
            self.self_discharge_per_hour.is_finite() && self.self_discharge_per_hour >= 0.0,
            "self-discharge must be non-negative, got {}",
            self.self_discharge_per_hour,
        );
        ensure!(
            MegawattHours::ZERO <= self.soc_min
                && self.soc_min <= self.soc_init
                && self.soc_init <= self.soc_max,
            "SoC must satisfy 0 ≤ min ≤ initial ≤ max, got {} ≤ {} ≤ {}",
            self.soc_min,
            self.soc_init,
            self.soc_max,
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// 10 MWh track with 5 MW in both directions and no losses, starting half-full.
    pub fn ideal_track() -> TrackParams {
        TrackParams::builder()
            .capacity(MegawattHours(10.0))
            .charge_power_cap(Megawatts(5.0))
            .discharge_power_cap(Megawatts(5.0))
            .charge_efficiency(1.0)
            .discharge_efficiency(1.0)
            .soc_max(MegawattHours(10.0))
            .soc_init(MegawattHours(5.0))
            .build()
    }

    pub fn params(oze: TrackParams, arbi: TrackParams) -> Params {
        Params::builder()
            .bess(
                BessParams::builder()
                    .capacity(oze.capacity + arbi.capacity)
                    .charge_power_cap(oze.charge_power_cap)
                    .discharge_power_cap(oze.discharge_power_cap)
                    .charge_efficiency(oze.charge_efficiency)
                    .discharge_efficiency(oze.discharge_efficiency)
                    .soc_min(MegawattHours::ZERO)
                    .soc_max(oze.capacity + arbi.capacity)
                    .build(),
            )
            .share_oze(0.5)
            .oze(oze)
            .arbi(arbi)
            .build()
    }

    #[test]
    fn test_valid() {
        params(ideal_track(), ideal_track()).validate().unwrap();
    }

    #[test]
    fn test_inverted_soc_bounds() {
        let mut params = params(ideal_track(), ideal_track());
        params.bess.soc_min = MegawattHours(15.0);
        params.bess.soc_max = MegawattHours(5.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_non_positive_capacity() {
        let mut params = params(ideal_track(), ideal_track());
        params.bess.capacity = MegawattHours::ZERO;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_initial_soc_above_maximum() {
        let track = TrackParams { soc_init: MegawattHours(11.0), ..ideal_track() };
        let error = params(track, ideal_track()).validate().unwrap_err();
        assert!(format!("{error:#}").contains("OZE"));
    }

    #[test]
    fn test_zero_capacity_track_is_valid() {
        let idle = TrackParams {
            capacity: MegawattHours::ZERO,
            soc_max: MegawattHours::ZERO,
            soc_init: MegawattHours::ZERO,
            ..ideal_track()
        };
        params(ideal_track(), idle).validate().unwrap();
    }

    #[test]
    fn test_zero_efficiency_is_valid() {
        let track = TrackParams { charge_efficiency: 0.0, ..ideal_track() };
        params(track, ideal_track()).validate().unwrap();
    }

    #[test]
    fn test_negative_contracted_power_is_ignored() {
        let mut params = params(ideal_track(), ideal_track());
        params.contracted_power = Some(Megawatts(-1.0));
        params.validate().unwrap();
        assert_eq!(params.effective_contracted_power(), None);
    }
}
