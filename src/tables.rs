use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        params::{Params, TrackParams},
        summary::TrackSummary,
    },
    pipeline::RunReport,
    quantity::{Zero, currency::Zlotys, energy::MegawattHours},
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn optional<T: ToString>(value: Option<T>) -> Cell {
    value.map_or_else(
        || Cell::new("not set").add_attribute(Attribute::Dim),
        |value| Cell::new(value).set_alignment(CellAlignment::Right),
    )
}

pub fn build_params_table(params: &Params) -> Table {
    let mut table = new_table();
    table.set_header(vec!["", "Storage", "OZE", "ARBI"]);

    let bess = &params.bess;
    let (oze, arbi) = (&params.oze, &params.arbi);
    let mut add_row = |name: &str, bess: String, track: &dyn Fn(&TrackParams) -> String| {
        table.add_row(vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(bess).set_alignment(CellAlignment::Right),
            Cell::new(track(oze)).set_alignment(CellAlignment::Right),
            Cell::new(track(arbi)).set_alignment(CellAlignment::Right),
        ]);
    };
    add_row("Capacity", bess.capacity.to_string(), &|track| track.capacity.to_string());
    add_row("Share", "100.0%".to_owned(), &|track| {
        percent(if bess.capacity > MegawattHours::ZERO { track.capacity / bess.capacity } else { 0.0 })
    });
    add_row("Charging power", bess.charge_power_cap.to_string(), &|track| {
        track.charge_power_cap.to_string()
    });
    add_row("Discharging power", bess.discharge_power_cap.to_string(), &|track| {
        track.discharge_power_cap.to_string()
    });
    add_row("Charging efficiency", percent(bess.charge_efficiency), &|track| {
        percent(track.charge_efficiency)
    });
    add_row("Discharging efficiency", percent(bess.discharge_efficiency), &|track| {
        percent(track.discharge_efficiency)
    });
    add_row(
        "Self-discharge per hour",
        format!("{:.6}%", bess.self_discharge_per_hour * 100.0),
        &|track| format!("{:.6}%", track.self_discharge_per_hour * 100.0),
    );
    add_row("Minimum SoC", bess.soc_min.to_string(), &|track| track.soc_min.to_string());
    add_row("Maximum SoC", bess.soc_max.to_string(), &|track| track.soc_max.to_string());
    add_row("Initial SoC", (oze.soc_init + arbi.soc_init).to_string(), &|track| {
        track.soc_init.to_string()
    });

    table.add_row(vec![
        Cell::new("Contracted power").add_attribute(Attribute::Bold),
        optional(params.effective_contracted_power()),
        Cell::new(""),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Price thresholds").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        optional(params.arbi_price_low.zip(params.arbi_price_high).map(|(low, high)| {
            format!("{low} … {high}")
        })),
    ]);
    table
}

pub fn build_report_table(report: &RunReport) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Track", "Steps", "Charged", "Discharged", "Conversion", "Idle", "Full", "Empty", "Outcome",
    ]);

    let summary_cells = |name: &str, summary: &TrackSummary| {
        vec![
            Cell::new(name).add_attribute(Attribute::Bold),
            Cell::new(summary.n_steps).set_alignment(CellAlignment::Right),
            Cell::new(summary.charge).set_alignment(CellAlignment::Right),
            Cell::new(summary.discharge).set_alignment(CellAlignment::Right),
            Cell::new(summary.conversion_loss)
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(summary.idle_loss).set_alignment(CellAlignment::Right).add_attribute(Attribute::Dim),
            Cell::new(summary.n_hit_max).set_alignment(CellAlignment::Right),
            Cell::new(summary.n_hit_min).set_alignment(CellAlignment::Right),
        ]
    };

    let mut oze = summary_cells("OZE", &report.oze);
    let uncompensated = report.spill_surplus + report.unmet_deficit;
    oze.push(
        Cell::new(format!("spill {}, unmet {}", report.spill_surplus, report.unmet_deficit)).fg(
            if uncompensated > MegawattHours::ZERO { Color::DarkYellow } else { Color::Green },
        ),
    );
    table.add_row(oze);

    let mut arbi = summary_cells("ARBI", &report.arbi);
    arbi.push(
        Cell::new(format!("net {}", report.net_value))
            .set_alignment(CellAlignment::Right)
            .fg(if report.net_value >= Zlotys::ZERO { Color::Green } else { Color::Red }),
    );
    table.add_row(arbi);

    let is_consistent = report.n_unmatched_oze == 0 && report.n_unmatched_arbi == 0;
    table.add_row(vec![
        Cell::new("Broker").add_attribute(Attribute::Bold),
        Cell::new(report.n_broker_rows).set_alignment(CellAlignment::Right),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(format!(
            "{} curtailed rows ({}), unmatched {} OZE / {} ARBI",
            report.n_curtailed_rows,
            report.total_curtailed,
            report.n_unmatched_oze,
            report.n_unmatched_arbi,
        ))
        .fg(if !is_consistent {
            Color::Red
        } else if report.n_curtailed_rows != 0 {
            Color::DarkYellow
        } else {
            Color::Green
        }),
    ]);
    table
}
