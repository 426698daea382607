//! Parameter resolution from raw configuration tables.
//!
//! Every TOML file is a source table of flat `key = value` pairs. The tables are merged into
//! a single key space, and the raw settings are converted into validated [`Params`].

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use toml::{Table, Value};

use crate::{
    core::params::{BessParams, Params, TrackParams},
    prelude::*,
    quantity::{Zero, energy::MegawattHours, power::Megawatts, price::MegawattHourPrice},
};

/// Bookkeeping columns that are never parameters.
const METADATA_KEYS: [&str; 10] = [
    "id",
    "pk",
    "uid",
    "inserted_at",
    "updated_at",
    "created_at",
    "timestamp",
    "ts",
    "ts_utc",
    "ts_local",
];

/// Legacy parameter table keys and the names they stand for.
const ALIASES: [(&str, &str); 13] = [
    ("emax", "capacity_mwh"),
    ("bess_c_rate_charge", "charge_time_h"),
    ("bess_c_rate_discharge", "discharge_time_h"),
    ("bess_charge_eff", "charge_efficiency_pct"),
    ("bess_discharge_eff", "discharge_efficiency_pct"),
    ("bess_lambda_month", "self_discharge_pct_per_month"),
    ("procent_arbitrazu", "arbitrage_share_pct"),
    ("bess_soc_start", "soc_start_pct"),
    ("bess_min_soc", "soc_min_pct"),
    ("bess_max_soc", "soc_max_pct"),
    ("arbi_price_low", "price_low_pln_mwh"),
    ("arbi_price_high", "price_high_pln_mwh"),
    ("klient_moc_umowna", "contracted_power_mw"),
];

/// Self-discharge is configured per month of 30 days.
const HOURS_PER_MONTH: f64 = 30.0 * 24.0;

/// Merged raw settings with the source of each key.
#[derive(Default)]
pub struct RawSettings(BTreeMap<String, (f64, String)>);

impl RawSettings {
    /// Merge another source table.
    ///
    /// The same key with a different value in two sources is a conflict.
    /// Legacy keys are renamed first, so `emax` conflicts with `capacity_mwh` as well.
    pub fn merge(&mut self, source: &str, table: &Table) -> Result {
        for (key, value) in flatten(table) {
            if METADATA_KEYS.contains(&key.to_lowercase().as_str()) {
                continue;
            }
            let number = parse_number(&key, value)?;
            let key = canonical_key(key);
            if let Some((existing, existing_source)) = self.0.get(&key) {
                ensure!(
                    existing.to_bits() == number.to_bits(),
                    "conflicting values for `{key}`: {existing} (from `{existing_source}`) vs {number} (from `{source}`)",
                );
                continue;
            }
            self.0.insert(key, (number, source.to_owned()));
        }
        Ok(())
    }

    fn required(&self, key: &str) -> Result<f64> {
        self.optional(key).with_context(|| {
            format!("missing required parameter `{key}`, available: [{}]", self.0.keys().join(", "))
        })
    }

    fn optional(&self, key: &str) -> Option<f64> {
        self.0.get(key).map(|(value, _)| *value)
    }

    pub fn n_keys(&self) -> usize {
        self.0.len()
    }

    /// Convert the raw settings into the run parameters.
    pub fn resolve(&self) -> Result<Params> {
        let capacity = self.required("capacity_mwh")?;
        let charge_time = self.required("charge_time_h")?;
        let discharge_time = self.required("discharge_time_h")?;
        let charge_efficiency = self.required("charge_efficiency_pct")? / 100.0;
        let discharge_efficiency = self.required("discharge_efficiency_pct")? / 100.0;
        let self_discharge_per_month = self.optional("self_discharge_pct_per_month").unwrap_or(0.0);
        let arbitrage_share = self.required("arbitrage_share_pct")? / 100.0;
        let soc_start = self.required("soc_start_pct")? / 100.0;
        let soc_min = self.required("soc_min_pct")? / 100.0;
        let soc_max = self.required("soc_max_pct")? / 100.0;

        ensure!(capacity.is_finite() && capacity > 0.0, "capacity must be positive, got {capacity} MWh");
        ensure!(
            charge_time > 0.0 && discharge_time > 0.0,
            "charge and discharge times must be positive, got {charge_time} h and {discharge_time} h",
        );

        let self_discharge_per_hour = self_discharge_per_month / 100.0 / HOURS_PER_MONTH;
        let share_oze = (1.0 - arbitrage_share).clamp(0.0, 1.0);
        let charge_power_cap = Megawatts(capacity / charge_time);
        let discharge_power_cap = Megawatts(capacity / discharge_time);
        let capacity = MegawattHours(capacity);

        let bess = BessParams::builder()
            .capacity(capacity)
            .charge_power_cap(charge_power_cap)
            .discharge_power_cap(discharge_power_cap)
            .charge_efficiency(charge_efficiency)
            .discharge_efficiency(discharge_efficiency)
            .self_discharge_per_hour(self_discharge_per_hour)
            .soc_min(capacity * soc_min)
            .soc_max(capacity * soc_max)
            .build();

        // Both tracks are rated for the full storage power, the broker reconciles them afterwards:
        let track = |share: f64| {
            TrackParams::builder()
                .capacity(capacity * share)
                .charge_power_cap(charge_power_cap)
                .discharge_power_cap(discharge_power_cap)
                .charge_efficiency(charge_efficiency)
                .discharge_efficiency(discharge_efficiency)
                .self_discharge_per_hour(self_discharge_per_hour)
                .soc_max(capacity * share)
                .soc_init((capacity * (soc_start * share)).clamp(MegawattHours::ZERO, capacity * share))
                .build()
        };

        let params = Params::builder()
            .bess(bess)
            .share_oze(share_oze)
            .oze(track(share_oze))
            .arbi(track(1.0 - share_oze))
            .maybe_contracted_power(self.optional("contracted_power_mw").map(Megawatts))
            .maybe_arbi_price_low(self.optional("price_low_pln_mwh").map(MegawattHourPrice))
            .maybe_arbi_price_high(self.optional("price_high_pln_mwh").map(MegawattHourPrice))
            .build();
        info!(
            %capacity,
            share_oze,
            charge_c_rate = 1.0 / charge_time,
            discharge_c_rate = 1.0 / discharge_time,
            %charge_power_cap,
            %discharge_power_cap,
            charge_efficiency,
            discharge_efficiency,
            self_discharge_per_hour,
            oze_soc_init = %params.oze.soc_init,
            arbi_soc_init = %params.arbi.soc_init,
            price_low = ?params.arbi_price_low,
            price_high = ?params.arbi_price_high,
            contracted_power = ?params.contracted_power,
            "resolved parameters",
        );
        params.validate()?;
        Ok(params)
    }
}

/// Load, merge and resolve the parameters from a TOML file or a directory of them.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<Params> {
    let mut settings = RawSettings::default();
    for source in list_sources(path)? {
        let text = fs::read_to_string(&source)
            .with_context(|| format!("failed to read `{}`", source.display()))?;
        let table: Table = toml::from_str(&text)
            .with_context(|| format!("failed to parse `{}`", source.display()))?;
        let name = source.file_name().map_or_else(
            || source.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        debug!(source = name, n_keys = table.len(), "loaded parameter table");
        settings.merge(&name, &table)?;
    }
    info!(n_keys = settings.n_keys(), "merged parameter tables");
    settings.resolve()
}

/// Parameter source files: the file itself, or the TOML files in the directory sorted by name.
pub fn list_sources(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        ensure!(path.exists(), "parameter source `{}` does not exist", path.display());
        return Ok(vec![path.to_owned()]);
    }
    let mut sources = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("failed to list `{}`", path.display()))?
    {
        let source = entry?.path();
        if source.is_file() && source.extension().is_some_and(|extension| extension == "toml") {
            sources.push(source);
        }
    }
    ensure!(!sources.is_empty(), "no parameter tables found in `{}`", path.display());
    sources.sort();
    Ok(sources)
}

fn canonical_key(key: String) -> String {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map_or(key, |(_, canonical)| (*canonical).to_owned())
}

/// Flatten nested tables one level into the top-level key space.
///
/// Top-level keys win over the nested ones, so the `[payload]`-style sections only add keys.
fn flatten(table: &Table) -> Vec<(String, &Value)> {
    let mut pairs =
        table.iter().filter(|(_, value)| !value.is_table()).map(|(key, value)| (key.clone(), value)).collect_vec();
    for nested in table.values().filter_map(Value::as_table) {
        for (key, value) in nested {
            if !value.is_table() && !table.contains_key(key) {
                pairs.push((key.clone(), value));
            }
        }
    }
    pairs
}

/// Accept integers, floats, and numeric strings with either decimal separator.
#[expect(clippy::cast_precision_loss)]
fn parse_number(key: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Integer(integer) => Ok(*integer as f64),
        Value::Float(float) => Ok(*float),
        Value::String(text) => text
            .trim()
            .replace(',', ".")
            .parse()
            .with_context(|| format!("value of `{key}` is not a number: {text:?}")),
        _ => bail!("value of `{key}` is not a number: {value}"),
    }
}
