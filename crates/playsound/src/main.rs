//! playsound: decode audio files with Symphonia and stream them to the default output
//! device through CPAL.
//!
//! ## Commands
//! - `play`: play files in order, each to the end.
//! - `formats`: list the decoder library version and supported formats.

use anyhow::Result;
use clap::Parser;
use playsound::cli::{Args, Command};
use playsound::config::PlayConfig;
use playsound::runtime;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,playsound=info,playsound_core=info")
        }))
        .init();

    match args.cmd {
        Command::Play { paths, tuning } => runtime::run_play(PlayConfig {
            paths,
            player: tuning.to_player_config(),
        }),
        Command::Formats { json } => runtime::run_formats(json),
    }
}
