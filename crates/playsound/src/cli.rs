use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use playsound_core::config::PlayerConfig;

#[derive(Parser, Debug)]
#[command(name = "playsound", version, about = "Play audio files on the default output device")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play one or more audio files, one after another
    Play {
        /// Paths to audio files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Show the decoder library version and the formats it can open
    Formats {
        /// Print the catalogue as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Playback knobs. Defaults match [`PlayerConfig::default`].
#[derive(clap::Args, Debug, Clone)]
pub struct TuningArgs {
    /// Device buffer size in frames
    #[arg(long, default_value_t = 4096, value_parser = clap::value_parser!(u32).range(1..))]
    pub buffer_frames: u32,

    /// Decoder chunk size in bytes
    #[arg(long, default_value_t = 65_536)]
    pub decode_buffer_bytes: usize,

    /// Completion poll interval in milliseconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,

    /// Device buffers to wait after stopping, so the tail can play out
    #[arg(long, default_value_t = 2)]
    pub drain_periods: u32,
}

impl TuningArgs {
    pub fn to_player_config(&self) -> PlayerConfig {
        PlayerConfig {
            buffer_frames: self.buffer_frames,
            decode_buffer_bytes: self.decode_buffer_bytes.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            drain_periods: self.drain_periods,
        }
    }
}
