//! Playback lifecycle: open decoder, open device, stream, wait, drain, tear down.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::{PlayerConfig, drain_duration};
use crate::decode::{DecoderStatus, SoundDecoder, SymphoniaDecoder};
use crate::device::{DataCallback, OutputBackend, OutputStream};
use crate::error::{PlayError, Result};
use crate::format::DeviceFormat;
use crate::stream::{Completion, StreamState};

/// Opens a decoder for a path.
pub trait OpenDecoder {
    type Decoder: SoundDecoder + Send + 'static;

    fn open(&self, path: &Path, config: &PlayerConfig) -> Result<Self::Decoder>;
}

/// Opens files with [`SymphoniaDecoder`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaOpener;

impl OpenDecoder for SymphoniaOpener {
    type Decoder = SymphoniaDecoder;

    fn open(&self, path: &Path, config: &PlayerConfig) -> Result<SymphoniaDecoder> {
        SymphoniaDecoder::open(path, config.decode_buffer_bytes)
    }
}

/// Summary of a finished playback.
#[derive(Clone, Debug, Serialize)]
pub struct PlaybackReport {
    pub path: PathBuf,
    pub format: DeviceFormat,
    /// Decoded bytes handed to the device (silence padding excluded).
    pub bytes_played: u64,
    pub elapsed_ms: u64,
}

/// Plays one file at a time through an output backend.
pub struct Player<O, B> {
    opener: O,
    backend: B,
    config: PlayerConfig,
}

impl<O: OpenDecoder, B: OutputBackend> Player<O, B> {
    pub fn new(opener: O, backend: B, config: PlayerConfig) -> Self {
        Self {
            opener,
            backend,
            config,
        }
    }

    /// Play `path` to the end and block until the device has been closed.
    ///
    /// Fails early with [`PlayError::CannotOpenDecoder`] (no device is touched) or
    /// [`PlayError::CannotOpenDevice`] (the decoder is released). A decoder error
    /// mid-stream ends playback at that point and is returned as [`PlayError::Decode`]
    /// after teardown.
    pub fn play(&self, path: &Path) -> Result<PlaybackReport> {
        let started = Instant::now();
        let decoder = self.opener.open(path, &self.config)?;
        let format = DeviceFormat::from_spec(decoder.spec(), self.config.buffer_frames);

        let state = StreamState::new(decoder, format);
        let completion = state.completion();
        let state = Arc::new(Mutex::new(state));

        let state_cb = state.clone();
        let callback: DataCallback = Box::new(move |out: &mut [u8]| {
            state_cb
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .fill(out);
        });

        // On failure the backend drops the callback, leaving `state` the last owner.
        let stream = self.backend.open(&format, callback)?;

        tracing::info!(
            path = ?path,
            format = %format,
            period_ms = format.buffer_period().as_millis() as u64,
            "now playing"
        );
        stream.resume()?;
        wait_for_completion(&completion, self.config.poll_interval);

        if let Err(e) = stream.pause() {
            tracing::warn!("pause failed: {e}");
        }
        let device_frames = stream.buffer_frames().unwrap_or(format.buffer_frames);
        thread::sleep(drain_duration(
            device_frames,
            format.sample_rate,
            self.config.drain_periods,
        ));

        drop(stream);
        let (bytes_played, decode_error) = match Arc::try_unwrap(state) {
            Ok(state) => {
                let state = state.into_inner().unwrap_or_else(PoisonError::into_inner);
                let bytes = state.bytes_emitted();
                let decoder = state.into_decoder();
                let error = decode_error(&decoder);
                drop(decoder);
                (bytes, error)
            }
            Err(shared) => {
                tracing::warn!(
                    path = ?path,
                    "output still holds the playback state after close; \
                     decoder is released when it lets go"
                );
                let state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                (state.bytes_emitted(), decode_error(state.decoder()))
            }
        };

        if let Some(reason) = decode_error {
            return Err(PlayError::Decode {
                path: path.to_path_buf(),
                reason,
            });
        }

        let report = PlaybackReport {
            path: path.to_path_buf(),
            format,
            bytes_played,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            path = ?path,
            bytes = report.bytes_played,
            elapsed_ms = report.elapsed_ms,
            "playback completed"
        );
        Ok(report)
    }
}

fn decode_error<D: SoundDecoder>(decoder: &D) -> Option<String> {
    (decoder.status() == DecoderStatus::Error)
        .then(|| decoder.error().unwrap_or("Unknown error").to_string())
}

/// Block until the callback reports the stream drained, checking every `interval`.
pub fn wait_for_completion(completion: &Completion, interval: Duration) {
    while !completion.is_set() {
        thread::sleep(interval);
    }
}
