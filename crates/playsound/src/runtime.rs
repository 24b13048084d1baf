//! Front-end runtime.
//!
//! Playback runs on a worker thread so the calling thread stays free; progress comes
//! back over a channel and is reported here.

use std::path::PathBuf;
use std::thread;

use anyhow::{Result, anyhow, bail};
use crossbeam_channel::Receiver;
use playsound_core::catalog::DecoderCatalog;
use playsound_core::device::{CpalBackend, OutputBackend};
use playsound_core::pipeline::{OpenDecoder, PlaybackReport, Player, SymphoniaOpener};
use playsound_core::PlayError;

use crate::config::PlayConfig;

/// Progress of the playback worker.
#[derive(Debug)]
pub enum PlayEvent {
    Started {
        path: PathBuf,
    },
    Finished {
        path: PathBuf,
        result: std::result::Result<PlaybackReport, PlayError>,
    },
}

/// Outcome counts for a batch of files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaySummary {
    pub played: usize,
    pub failed: usize,
}

/// Play every file in `config.paths` on the default output device, in order.
///
/// Individual failures are logged and skipped; the call fails if any file did.
pub fn run_play(config: PlayConfig) -> Result<()> {
    let catalog = DecoderCatalog::discover();
    for path in &config.paths {
        if !catalog.supports(path) {
            tracing::warn!(path = ?path, "extension not in the supported list; probing anyway");
        }
    }

    let total = config.paths.len();
    let player_config = config.player.clone();
    let (events, worker) = spawn_playback(config.paths, move || {
        Player::new(SymphoniaOpener, CpalBackend::new(), player_config)
    });

    let summary = report_events(&events);
    worker
        .join()
        .map_err(|_| anyhow!("playback worker panicked"))?;

    if summary.failed > 0 {
        bail!("{} of {total} file(s) failed to play", summary.failed);
    }
    Ok(())
}

/// Print the decoder catalogue, as text or JSON.
pub fn run_formats(json: bool) -> Result<()> {
    let catalog = DecoderCatalog::discover();
    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        println!("{}", catalog.render());
    }
    Ok(())
}

/// Start a worker that builds a player and plays `paths` one at a time.
///
/// The player is constructed on the worker thread; audio hosts are not always `Send`.
pub fn spawn_playback<F, O, B>(
    paths: Vec<PathBuf>,
    make_player: F,
) -> (Receiver<PlayEvent>, thread::JoinHandle<()>)
where
    F: FnOnce() -> Player<O, B> + Send + 'static,
    O: OpenDecoder + 'static,
    B: OutputBackend + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let worker = thread::spawn(move || {
        let player = make_player();
        for path in paths {
            if tx.send(PlayEvent::Started { path: path.clone() }).is_err() {
                break;
            }
            let result = player.play(&path);
            if tx.send(PlayEvent::Finished { path, result }).is_err() {
                break;
            }
        }
    });
    (rx, worker)
}

/// Log worker events until the worker hangs up.
pub fn report_events(events: &Receiver<PlayEvent>) -> PlaySummary {
    let mut summary = PlaySummary::default();
    for event in events.iter() {
        match event {
            PlayEvent::Started { path } => {
                tracing::info!(path = ?path, "starting playback");
            }
            PlayEvent::Finished {
                path,
                result: Ok(report),
            } => {
                summary.played += 1;
                tracing::info!(
                    path = ?path,
                    elapsed_ms = report.elapsed_ms,
                    "playback completed"
                );
            }
            PlayEvent::Finished {
                path,
                result: Err(e),
            } => {
                summary.failed += 1;
                tracing::error!(path = ?path, "{e}");
            }
        }
    }
    summary
}
