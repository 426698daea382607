//! File-backed store: the input series and the three output ledgers.

use std::{fs, path::PathBuf};

use bon::Builder;
use csv::{ReaderBuilder, Trim, Writer};
use itertools::Itertools;
use tempfile::NamedTempFile;

use crate::{
    core::{arbi::ArbiStep, broker::BrokerStep, interval::Interval, oze::OzeStep, series::Point, step::Step},
    prelude::*,
    quantity::{energy::MegawattHours, power::Megawatts, time::Hours},
};

pub const OZE_LEDGER: &str = "energy_oze_detail.csv";
pub const ARBI_LEDGER: &str = "energy_arbi_detail.csv";
pub const BROKER_LEDGER: &str = "energy_broker_detail.csv";

/// Columns shared by both track ledgers, before the track-specific ones.
const STEP_HEADER: [&str; 12] = [
    "ts_start",
    "ts_end",
    "step_hours",
    "soc_start_mwh",
    "soc_end_mwh",
    "p_ch_mw",
    "p_dis_mw",
    "e_ch_mwh",
    "e_dis_mwh",
    "loss_conv_mwh",
    "loss_idle_mwh",
    "loss_total_mwh",
];

/// Columns shared by both track ledgers, after the track-specific ones.
const TRAILER_HEADER: [&str; 5] = [
    "soc_gap_to_min_start_mwh",
    "soc_gap_to_min_end_mwh",
    "time_below_min_h",
    "hit_part_cap_max",
    "hit_part_cap_min",
];

const OZE_DETAIL_HEADER: [&str; 2] = ["spill_surplus_mwh", "unmet_deficit_mwh"];

const ARBI_DETAIL_HEADER: [&str; 4] = ["price_pln_mwh", "cost_pln", "revenue_pln", "net_value_pln"];

const BROKER_HEADER: [&str; 15] = [
    "ts_start",
    "ts_end",
    "step_hours",
    "req_ch_oze_mw",
    "req_dis_oze_mw",
    "req_ch_arbi_mw",
    "req_dis_arbi_mw",
    "cap_ch_mw",
    "cap_dis_mw",
    "cap_contract_mw",
    "alloc_ch_oze_mw",
    "alloc_dis_oze_mw",
    "alloc_ch_arbi_mw",
    "alloc_dis_arbi_mw",
    "note",
];

#[must_use]
#[derive(Clone, Debug, Builder)]
pub struct Store {
    /// CSV file with the `ts_utc`, `delta_brutto`, and `price_pln_mwh` columns.
    #[builder(into)]
    pub series_path: PathBuf,

    /// Directory of the output ledgers.
    #[builder(into)]
    pub output_dir: PathBuf,
}

impl Store {
    /// Read the input series sorted by timestamp.
    #[instrument(skip_all, fields(path = %self.series_path.display()))]
    pub fn load_series(&self) -> Result<Vec<Point>> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(&self.series_path)
            .with_context(|| format!("failed to open `{}`", self.series_path.display()))?;
        let mut points: Vec<Point> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .with_context(|| format!("failed to read `{}`", self.series_path.display()))?;
        points.sort_by_key(|point| point.ts_utc);
        if let Some((duplicate, _)) =
            points.iter().tuple_windows().find(|(current, next)| current.ts_utc == next.ts_utc)
        {
            bail!("duplicate timestamp in the series: {}", duplicate.ts_utc);
        }
        info!(
            n_points = points.len(),
            first = ?points.first().map(|point| point.ts_utc),
            last = ?points.last().map(|point| point.ts_utc),
            "loaded series",
        );
        Ok(points)
    }

    /// Replace all three ledgers.
    ///
    /// All ledgers are written to temporary files next to the targets first, and only then
    /// renamed over them. A failure at any point leaves the previous ledgers in place.
    #[instrument(skip_all, fields(output_dir = %self.output_dir.display()))]
    pub fn replace_ledgers(&self, oze: &[OzeStep], arbi: &[ArbiStep], broker: &[BrokerStep]) -> Result {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create `{}`", self.output_dir.display()))?;
        let oze_file = self.stage(&step_header(&OZE_DETAIL_HEADER), oze.iter().map(|step| {
            step_record(step, [step.detail.spill_surplus, step.detail.unmet_deficit].map(energy))
        }))?;
        let arbi_file = self.stage(&step_header(&ARBI_DETAIL_HEADER), arbi.iter().map(|step| {
            let detail = &step.detail;
            step_record(step, [
                detail.price.map_or_else(String::new, |price| format!("{:.2}", price.0)),
                format!("{:.2}", detail.cost.0),
                format!("{:.2}", detail.revenue.0),
                format!("{:.2}", detail.net_value().0),
            ])
        }))?;
        let broker_file = self.stage(&BROKER_HEADER, broker.iter().map(broker_record))?;
        self.commit([(OZE_LEDGER, oze_file), (ARBI_LEDGER, arbi_file), (BROKER_LEDGER, broker_file)])?;
        info!(n_oze = oze.len(), n_arbi = arbi.len(), n_broker = broker.len(), "replaced ledgers");
        Ok(())
    }

    pub fn ledger_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Write the ledger into a synced temporary file in the output directory.
    fn stage(
        &self,
        header: &[&str],
        records: impl IntoIterator<Item = Vec<String>>,
    ) -> Result<NamedTempFile> {
        let file = NamedTempFile::new_in(&self.output_dir)
            .with_context(|| format!("failed to create a temporary file in `{}`", self.output_dir.display()))?;
        let mut writer = Writer::from_writer(file);
        writer.write_record(header)?;
        for record in records {
            writer.write_record(&record)?;
        }
        let file = writer.into_inner().map_err(|error| error.into_error())?;
        file.as_file().sync_all()?;
        Ok(file)
    }

    /// Rename the staged files over the targets.
    ///
    /// The current targets are copied aside beforehand, and restored if any rename fails.
    fn commit<const N: usize>(&self, staged: [(&str, NamedTempFile); N]) -> Result {
        let mut backups = Vec::with_capacity(N);
        for (name, _) in &staged {
            let path = self.ledger_path(name);
            if !path.exists() {
                continue;
            }
            ensure!(path.is_file(), "`{}` is not a regular file", path.display());
            let backup = NamedTempFile::new_in(&self.output_dir)?;
            fs::copy(&path, backup.path())
                .with_context(|| format!("failed to back up `{}`", path.display()))?;
            backups.push((path, backup));
        }
        for (name, file) in staged {
            let path = self.ledger_path(name);
            if let Err(error) = file.persist(&path) {
                for (path, backup) in backups {
                    if let Err(restore_error) = backup.persist(&path) {
                        error!(path = %path.display(), "failed to restore: {restore_error:#}");
                    }
                }
                return Err(error).with_context(|| format!("failed to replace `{}`", path.display()));
            }
            debug!(path = %path.display(), "replaced");
        }
        Ok(())
    }
}

fn step_header(detail: &[&'static str]) -> Vec<&'static str> {
    STEP_HEADER.iter().chain(detail).chain(&TRAILER_HEADER).copied().collect()
}

fn step_record<D, const N: usize>(step: &Step<D>, detail: [String; N]) -> Vec<String> {
    let mut record = interval_fields(step.interval, step.hours);
    record.extend([step.soc_start, step.soc_end].map(energy));
    record.extend([step.charge_power, step.discharge_power].map(power));
    record.extend(
        [
            step.charge_energy,
            step.discharge_energy,
            step.conversion_loss,
            step.idle_loss,
            step.total_loss,
        ]
        .map(energy),
    );
    record.extend(detail);
    record.extend([step.gap_to_min_start, step.gap_to_min_end].map(energy));
    record.push(format!("{:.6}", step.time_below_min.0));
    record.push(step.hit_capacity_max.to_string());
    record.push(step.hit_capacity_min.to_string());
    record
}

fn broker_record(step: &BrokerStep) -> Vec<String> {
    let mut record = interval_fields(step.interval, step.hours);
    record.extend(
        [
            step.charge.requested_oze,
            step.discharge.requested_oze,
            step.charge.requested_arbi,
            step.discharge.requested_arbi,
            step.charge_cap,
            step.discharge_cap,
        ]
        .map(power),
    );
    record.push(step.contracted_power.map_or_else(String::new, power));
    record.extend(
        [
            step.charge.allocated_oze,
            step.discharge.allocated_oze,
            step.charge.allocated_arbi,
            step.discharge.allocated_arbi,
        ]
        .map(power),
    );
    record.push(step.note.clone().unwrap_or_default());
    record
}

fn interval_fields(interval: Interval, hours: Hours) -> Vec<String> {
    vec![interval.start.to_rfc3339(), interval.end.to_rfc3339(), hours.0.to_string()]
}

fn energy(energy: MegawattHours) -> String {
    format!("{:.6}", energy.0)
}

fn power(power: Megawatts) -> String {
    format!("{:.6}", power.0)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::{TimeZone, Utc};
    use csv::StringRecord;

    use super::*;
    use crate::{
        core::{
            arbi::{self, Arbitrage},
            broker,
            oze,
            params::tests::{ideal_track, params},
            series::tests::hourly,
        },
        quantity::price::MegawattHourPrice,
    };

    fn store(directory: &Path) -> Store {
        Store::builder()
            .series_path(directory.join("series.csv"))
            .output_dir(directory.join("out"))
            .build()
    }

    fn read(path: &Path) -> Result<(StringRecord, Vec<StringRecord>)> {
        let mut reader = csv::Reader::from_path(path)?;
        let header = reader.headers()?.clone();
        let records = reader.records().collect::<Result<_, _>>()?;
        Ok((header, records))
    }

    #[test]
    fn test_load_series() -> Result {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());
        fs::write(
            &store.series_path,
            "ts_utc,delta_brutto,price_pln_mwh\n\
             2025-01-01T01:00:00Z,-2.5,\n\
             2025-01-01T00:00:00Z, 3 ,420.5\n",
        )?;
        let points = store.load_series()?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].ts_utc, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(points[0].delta_brutto, MegawattHours(3.0));
        assert_eq!(points[0].price_pln_mwh, Some(MegawattHourPrice(420.5)));
        assert_eq!(points[1].price_pln_mwh, None);
        Ok(())
    }

    #[test]
    fn test_load_empty_series() -> Result {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());
        fs::write(&store.series_path, "ts_utc,delta_brutto,price_pln_mwh\n")?;
        assert!(store.load_series()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_timestamps() -> Result {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());
        fs::write(
            &store.series_path,
            "ts_utc,delta_brutto,price_pln_mwh\n\
             2025-01-01T00:00:00Z,1,\n\
             2025-01-01T00:00:00Z,2,\n",
        )?;
        assert!(store.load_series().is_err());
        Ok(())
    }

    #[test]
    fn test_missing_series() -> Result {
        let directory = tempfile::tempdir()?;
        assert!(store(directory.path()).load_series().is_err());
        Ok(())
    }

    #[test]
    fn test_replace_ledgers() -> Result {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());
        let points = hourly(&[(3.0, Some(100.0)), (-1.0, Some(900.0))]);
        let mut params = params(ideal_track(), ideal_track());
        params.contracted_power = Some(Megawatts(4.0));
        let arbitrage = Arbitrage::builder()
            .price_low(MegawattHourPrice(200.0))
            .price_high(MegawattHourPrice(800.0))
            .build();
        let oze = oze::compute(&points, &params.oze);
        let arbi = arbi::compute(&points, &params.arbi, &arbitrage);
        let broker = broker::compute(&oze, &arbi, &params);
        store.replace_ledgers(&oze, &arbi, &broker.steps)?;

        let (header, records) = read(&store.ledger_path(OZE_LEDGER))?;
        assert_eq!(header.len(), 19);
        assert_eq!(&header[12], "spill_surplus_mwh");
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "2025-01-01T00:00:00+00:00");
        assert_eq!(&records[0][1], "2025-01-01T01:00:00+00:00");
        assert_eq!(&records[0][2], "1");
        assert_eq!(&records[0][7], "3.000000");

        let (header, records) = read(&store.ledger_path(ARBI_LEDGER))?;
        assert_eq!(header.len(), 21);
        assert_eq!(&header[15], "net_value_pln");
        assert_eq!(&records[0][12], "100.00");
        assert_eq!(&records[0][13], "500.00");
        assert_eq!(&records[1][14], "4500.00");

        let (header, records) = read(&store.ledger_path(BROKER_LEDGER))?;
        assert_eq!(header.len(), 15);
        assert_eq!(&records[0][9], "4.000000");
        assert_eq!(&records[0][10], "3.000000");
        assert_eq!(&records[0][12], "1.000000");
        assert!(records[0][14].contains("ARBI charge curtailed"));
        Ok(())
    }

    #[test]
    fn test_replace_with_empty_ledgers() -> Result {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());
        fs::create_dir_all(&store.output_dir)?;
        fs::write(store.ledger_path(OZE_LEDGER), "stale")?;
        store.replace_ledgers(&[], &[], &[])?;
        for name in [OZE_LEDGER, ARBI_LEDGER, BROKER_LEDGER] {
            let (header, records) = read(&store.ledger_path(name))?;
            assert!(!header.is_empty());
            assert!(records.is_empty());
        }
        assert_eq!(fs::read_dir(&store.output_dir)?.count(), 3, "no temporary files are left");
        Ok(())
    }

    #[test]
    fn test_failed_replace_keeps_previous_ledgers() -> Result {
        let directory = tempfile::tempdir()?;
        let store = store(directory.path());
        fs::create_dir_all(store.ledger_path(BROKER_LEDGER))?;
        fs::write(store.ledger_path(OZE_LEDGER), "previous run")?;

        assert!(store.replace_ledgers(&[], &[], &[]).is_err());
        assert_eq!(fs::read_to_string(store.ledger_path(OZE_LEDGER))?, "previous run");
        assert!(!store.ledger_path(ARBI_LEDGER).exists());
        assert_eq!(fs::read_dir(&store.output_dir)?.count(), 2, "no temporary files are left");
        Ok(())
    }
}
