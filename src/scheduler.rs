//! Rebuild loop: periodic ticks plus input change detection.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use bon::Builder;
use tokio::{
    signal::ctrl_c,
    task::spawn_blocking,
    time::{Instant, MissedTickBehavior, interval},
};

use crate::{pipeline, prelude::*, resolver, store::Store};

/// Modification times of the watched inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Fingerprint(Vec<(PathBuf, Option<SystemTime>)>);

impl Fingerprint {
    /// Snapshot the series and every parameter source.
    ///
    /// The parameter directory itself is included, so that added and removed tables show up too.
    fn take(store: &Store, params_path: &Path) -> Self {
        let sources = resolver::list_sources(params_path).unwrap_or_default();
        let paths = [store.series_path.clone(), params_path.to_owned()].into_iter().chain(sources);
        Self(
            paths
                .map(|path| {
                    let modified = fs::metadata(&path).and_then(|metadata| metadata.modified()).ok();
                    (path, modified)
                })
                .collect(),
        )
    }
}

/// Coalesces bursts of input changes.
///
/// A rebuild is due once the inputs have stayed unchanged for the debounce period
/// after the last observed change.
#[derive(Debug)]
struct Debouncer<F> {
    debounce: Duration,
    last_seen: F,
    last_change_at: Option<Instant>,
}

impl<F: PartialEq> Debouncer<F> {
    fn new(initial: F, debounce: Duration) -> Self {
        Self { debounce, last_seen: initial, last_change_at: None }
    }

    /// Feed a new observation and tell whether the rebuild is due now.
    fn observe(&mut self, current: F, now: Instant) -> bool {
        if current != self.last_seen {
            self.last_seen = current;
            self.last_change_at = Some(now);
            return false;
        }
        match self.last_change_at {
            Some(changed_at) if now.duration_since(changed_at) >= self.debounce => {
                self.last_change_at = None;
                true
            }
            _ => false,
        }
    }
}

#[must_use]
#[derive(Builder)]
pub struct Scheduler {
    store: Store,
    params_path: PathBuf,

    #[builder(into)]
    tick: Duration,

    #[builder(into)]
    poll_interval: Duration,

    #[builder(into)]
    debounce: Duration,
}

impl Scheduler {
    /// Run until Ctrl-C.
    pub async fn run(self) -> Result {
        info!(
            tick = ?self.tick,
            poll_interval = ?self.poll_interval,
            debounce = ?self.debounce,
            "watching…",
        );
        self.rebuild("start-up").await;

        let mut ticks = interval(self.tick);
        ticks.reset_after(self.tick);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut polls = interval(self.poll_interval);
        polls.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut debouncer =
            Debouncer::new(Fingerprint::take(&self.store, &self.params_path), self.debounce);

        loop {
            tokio::select! {
                result = ctrl_c() => {
                    result.context("failed to listen for Ctrl-C")?;
                    info!("interrupted");
                    break;
                }
                _ = ticks.tick() => {
                    self.rebuild("periodic tick").await;
                }
                _ = polls.tick() => {
                    let fingerprint = Fingerprint::take(&self.store, &self.params_path);
                    if debouncer.observe(fingerprint, Instant::now()) {
                        self.rebuild("input change").await;
                        ticks.reset();
                    }
                }
            }
        }
        Ok(())
    }

    /// Rebuild on a blocking thread, errors are logged and swallowed.
    #[instrument(skip_all, fields(trigger = trigger))]
    async fn rebuild(&self, trigger: &str) {
        let store = self.store.clone();
        let params_path = self.params_path.clone();
        match spawn_blocking(move || pipeline::rebuild(&store, &params_path)).await {
            Ok(Ok(report)) => {
                debug!(?report, "rebuild completed");
            }
            Ok(Err(error)) => {
                error!("rebuild failed: {error:#}");
            }
            Err(error) => {
                error!("rebuild panicked: {error:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_secs(2);

    #[test]
    fn test_quiet_inputs_never_trigger() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(1, DEBOUNCE);
        assert!(!debouncer.observe(1, start));
        assert!(!debouncer.observe(1, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_change_triggers_after_the_debounce() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(1, DEBOUNCE);
        assert!(!debouncer.observe(2, start));
        assert!(!debouncer.observe(2, start + Duration::from_secs(1)));
        assert!(debouncer.observe(2, start + Duration::from_secs(2)));
        assert!(!debouncer.observe(2, start + Duration::from_secs(3)), "triggers only once");
    }

    #[test]
    fn test_burst_is_coalesced() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(1, DEBOUNCE);
        assert!(!debouncer.observe(2, start));
        assert!(!debouncer.observe(3, start + Duration::from_secs(1)));
        assert!(!debouncer.observe(4, start + Duration::from_secs(2)));
        assert!(!debouncer.observe(4, start + Duration::from_secs(3)));
        assert!(debouncer.observe(4, start + Duration::from_secs(4)));
    }

    #[test]
    fn test_fingerprint_tracks_modifications() -> Result {
        let directory = tempfile::tempdir()?;
        let store = Store::builder()
            .series_path(directory.path().join("series.csv"))
            .output_dir(directory.path().join("out"))
            .build();
        let params_path = directory.path().join("params");
        fs::create_dir_all(&params_path)?;

        let missing = Fingerprint::take(&store, &params_path);
        assert_eq!(missing.0.len(), 2);
        assert_eq!(missing.0[0].1, None);

        fs::write(&store.series_path, "ts_utc,delta_brutto,price_pln_mwh\n")?;
        fs::write(params_path.join("bess.toml"), "capacity_mwh = 1")?;
        let present = Fingerprint::take(&store, &params_path);
        assert_eq!(present.0.len(), 3);
        assert_ne!(missing, present);
        assert_eq!(present, Fingerprint::take(&store, &params_path));
        Ok(())
    }
}
