//! Ledger invariants over arbitrary series and parameters.

use chrono::{TimeDelta, TimeZone, Utc};
use proptest::prelude::*;

use crate::{
    core::{
        arbi::{self, Arbitrage},
        broker,
        oze,
        params::{TrackParams, tests::params},
        series::Point,
        step::Step,
    },
    quantity::{
        Zero,
        currency::Zlotys,
        energy::MegawattHours,
        power::Megawatts,
        price::MegawattHourPrice,
    },
};

/// Rounding on emission shifts every value by up to half a millionth.
const TOLERANCE: f64 = 1e-5;

fn arb_track() -> impl Strategy<Value = TrackParams> {
    (
        1.0..50.0_f64,
        0.0..0.3_f64,
        0.6..1.0_f64,
        0.0..1.0_f64,
        (0.0..20.0_f64, 0.0..20.0_f64),
        (0.5..=1.0_f64, 0.5..=1.0_f64),
        0.0..0.01_f64,
    )
        .prop_map(
            |(capacity, min_share, max_share, init_share, (charge_cap, discharge_cap), (charge_efficiency, discharge_efficiency), self_discharge_per_hour)| {
                let soc_min = capacity * min_share;
                let soc_max = capacity * max_share;
                TrackParams {
                    capacity: MegawattHours(capacity),
                    charge_power_cap: Megawatts(charge_cap),
                    discharge_power_cap: Megawatts(discharge_cap),
                    charge_efficiency,
                    discharge_efficiency,
                    self_discharge_per_hour,
                    soc_min: MegawattHours(soc_min),
                    soc_max: MegawattHours(soc_max),
                    soc_init: MegawattHours(soc_min + (soc_max - soc_min) * init_share),
                }
            },
        )
}

fn arb_series() -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec(
        (
            prop::sample::select(vec![15_i64, 30, 60]),
            -20.0..20.0_f64,
            prop::option::of(0.0..1000.0_f64),
        ),
        0..48,
    )
    .prop_map(|raw| {
        let mut ts_utc = Utc.with_ymd_and_hms(2025, 3, 30, 0, 0, 0).unwrap();
        raw.into_iter()
            .map(|(minutes, delta, price)| {
                let point = Point {
                    ts_utc,
                    delta_brutto: MegawattHours(delta),
                    price_pln_mwh: price.map(MegawattHourPrice),
                };
                ts_utc += TimeDelta::minutes(minutes);
                point
            })
            .collect()
    })
}

fn arb_arbitrage() -> impl Strategy<Value = Arbitrage> {
    (prop::option::of(0.0..400.0_f64), prop::option::of(300.0..1000.0_f64)).prop_map(
        |(low, high)| Arbitrage {
            price_low: low.map(MegawattHourPrice),
            price_high: high.map(MegawattHourPrice),
        },
    )
}

fn check_common<D>(steps: &[Step<D>], track: &TrackParams) -> Result<(), TestCaseError> {
    for step in steps {
        prop_assert!(step.soc_end.0 >= track.soc_min.0 - TOLERANCE);
        prop_assert!(step.soc_end.0 <= track.soc_max.0 + TOLERANCE);
        prop_assert!(step.charge_energy >= MegawattHours::ZERO);
        prop_assert!(step.discharge_energy >= MegawattHours::ZERO);
        prop_assert!(step.conversion_loss >= MegawattHours::ZERO);
        prop_assert!(step.idle_loss >= MegawattHours::ZERO);

        // Energy balance of the state of charge:
        if step.discharge_energy > MegawattHours::ZERO {
            let taken = step.soc_start.0 - step.soc_end.0;
            prop_assert!((taken - step.discharge_energy.0 - step.conversion_loss.0).abs() < TOLERANCE);
        } else {
            let stored = step.soc_end.0 - step.soc_start.0;
            prop_assert!((stored - step.charge_energy.0).abs() < TOLERANCE);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn oze_invariants(points in arb_series(), track in arb_track()) {
        let steps = oze::compute(&points, &track);
        prop_assert_eq!(steps.len(), points.len());
        check_common(&steps, &track)?;
        for step in &steps {
            prop_assert!(step.detail.spill_surplus >= MegawattHours::ZERO);
            prop_assert!(step.detail.unmet_deficit >= MegawattHours::ZERO);
        }
        prop_assert_eq!(steps, oze::compute(&points, &track));
    }

    #[test]
    fn arbi_invariants(points in arb_series(), track in arb_track(), arbitrage in arb_arbitrage()) {
        let steps = arbi::compute(&points, &track, &arbitrage);
        prop_assert_eq!(steps.len(), points.len());
        check_common(&steps, &track)?;
        for step in &steps {
            prop_assert!(step.detail.cost >= Zlotys::ZERO);
            prop_assert!(step.detail.revenue >= Zlotys::ZERO);
        }
        prop_assert_eq!(steps, arbi::compute(&points, &track, &arbitrage));
    }

    #[test]
    fn broker_serves_oze_first(
        points in arb_series(),
        oze_track in arb_track(),
        arbi_track in arb_track(),
        arbitrage in arb_arbitrage(),
        contracted_power in prop::option::of(0.0..30.0_f64),
    ) {
        let mut params = params(oze_track, arbi_track);
        params.contracted_power = contracted_power.map(Megawatts);
        let oze = oze::compute(&points, &params.oze);
        let arbi = arbi::compute(&points, &params.arbi, &arbitrage);

        let ledger = broker::compute(&oze, &arbi, &params);
        prop_assert!(ledger.is_consistent());
        prop_assert_eq!(ledger.steps.len(), points.len());

        let contract = params.effective_contracted_power();
        for step in &ledger.steps {
            for (allocation, rated) in [(step.charge, step.charge_cap), (step.discharge, step.discharge_cap)] {
                let cap = contract.map_or(rated, |contract| rated.min(contract));
                prop_assert!((allocation.allocated_oze.0 - allocation.requested_oze.min(cap).0).abs() < TOLERANCE);
                prop_assert!(allocation.allocated_oze.0 + allocation.allocated_arbi.0 <= cap.0 + TOLERANCE);
                prop_assert!(allocation.allocated_arbi <= allocation.requested_arbi);
            }
        }
    }
}
