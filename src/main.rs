#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod cli;
mod core;
mod pipeline;
mod prelude;
mod quantity;
mod resolver;
mod scheduler;
mod store;
mod tables;

use clap::{Parser, crate_version};

use crate::{cli::Args, prelude::*};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    args.command.run().await?;

    info!("done!");
    Ok(())
}
