use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use crate::{
    pipeline,
    prelude::*,
    resolver,
    scheduler::Scheduler,
    store::Store,
    tables::{build_params_table, build_report_table},
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    /// Maximum logging level.
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Recompute all ledgers once.
    #[clap(name = "rebuild")]
    Rebuild(RebuildArgs),

    /// Recompute on start-up, periodically, and whenever the inputs change.
    #[clap(name = "watch")]
    Watch(Box<WatchArgs>),

    /// Resolve and print the parameters without computing anything.
    #[clap(name = "params")]
    Params(ParamsArgs),
}

impl Command {
    pub async fn run(self) -> Result {
        match self {
            Self::Rebuild(args) => args.run(),
            Self::Watch(args) => args.run().await,
            Self::Params(args) => args.run(),
        }
    }
}

#[derive(Parser)]
pub struct ParamsSourceArgs {
    /// Parameter TOML file, or a directory of them merged in the file name order.
    #[clap(long = "params", env = "PARAMS_PATH")]
    pub path: PathBuf,
}

#[derive(Parser)]
pub struct StoreArgs {
    /// Input series CSV: `ts_utc`, `delta_brutto`, `price_pln_mwh`.
    #[clap(long = "series", env = "SERIES_PATH")]
    series_path: PathBuf,

    /// Directory of the output ledgers.
    #[clap(long = "output-dir", env = "OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,
}

impl From<StoreArgs> for Store {
    fn from(args: StoreArgs) -> Self {
        Self::builder().series_path(args.series_path).output_dir(args.output_dir).build()
    }
}

#[derive(Parser)]
pub struct RebuildArgs {
    #[clap(flatten)]
    store: StoreArgs,

    #[clap(flatten)]
    params: ParamsSourceArgs,
}

impl RebuildArgs {
    fn run(self) -> Result {
        let report = pipeline::rebuild(&self.store.into(), &self.params.path)?;
        println!("{}", build_report_table(&report));
        Ok(())
    }
}

#[derive(Parser)]
pub struct WatchArgs {
    #[clap(flatten)]
    store: StoreArgs,

    #[clap(flatten)]
    params: ParamsSourceArgs,

    /// Unconditional rebuild period.
    #[clap(long, env = "PERIODIC_TICK", default_value = "5min")]
    periodic_tick: humantime::Duration,

    /// How often the input modification times are checked.
    #[clap(long, env = "POLL_INTERVAL", default_value = "1s")]
    poll_interval: humantime::Duration,

    /// Quiet period after the last input change before rebuilding.
    #[clap(long, env = "DEBOUNCE", default_value = "2s")]
    debounce: humantime::Duration,
}

impl WatchArgs {
    async fn run(self) -> Result {
        ensure!(!self.periodic_tick.is_zero(), "periodic tick must be positive");
        ensure!(!self.poll_interval.is_zero(), "poll interval must be positive");
        Scheduler::builder()
            .store(self.store.into())
            .params_path(self.params.path)
            .tick(self.periodic_tick)
            .poll_interval(self.poll_interval)
            .debounce(self.debounce)
            .build()
            .run()
            .await
    }
}

#[derive(Parser)]
pub struct ParamsArgs {
    #[clap(flatten)]
    params: ParamsSourceArgs,
}

impl ParamsArgs {
    fn run(self) -> Result {
        let params = resolver::load(&self.params.path)?;
        println!("{}", build_params_table(&params));
        Ok(())
    }
}
