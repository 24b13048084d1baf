use std::path::PathBuf;

pub use playsound_core::config::PlayerConfig;

/// Everything `run_play` needs: the files, in order, and the playback tuning.
#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub paths: Vec<PathBuf>,
    pub player: PlayerConfig,
}
