//! Streaming callback.
//!
//! [`StreamState::fill`] runs on the audio backend's thread every time the device wants
//! more bytes. It drains the decoder's current chunk into the device buffer, decodes a
//! new chunk when the old one runs out, and pads with silence once nothing more can be
//! produced.
//!
//! ## Real-time constraints
//! The callback only ever decodes as much as one request needs and never waits on other
//! threads. Nothing is raised from it; decoder errors are read back after playback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::decode::{DecoderStatus, SoundDecoder};
use crate::format::DeviceFormat;

/// Where the callback is in its drain cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StreamPhase {
    /// Pending chunk is empty; the next request decodes first.
    NeedsData,
    /// Pending chunk still has bytes to copy.
    HasData,
    /// Decoder is finished and everything has been emitted.
    Drained,
}

/// Completion flag shared between the callback and the thread waiting on playback.
///
/// The only piece of playback state read outside the callback.
#[derive(Clone, Debug, Default)]
pub struct Completion(Arc<AtomicBool>);

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Unconsumed tail of the decoder's most recent chunk.
#[derive(Clone, Copy, Debug, Default)]
struct Pending {
    offset: usize,
    remaining: usize,
}

/// Mutable state of one playback operation, driven by the device callback.
pub struct StreamState<D> {
    decoder: D,
    format: DeviceFormat,
    pending: Pending,
    completion: Completion,
    bytes_emitted: u64,
}

impl<D: SoundDecoder> StreamState<D> {
    pub fn new(decoder: D, format: DeviceFormat) -> Self {
        Self {
            decoder,
            format,
            pending: Pending::default(),
            completion: Completion::new(),
            bytes_emitted: 0,
        }
    }

    /// A handle on the completion flag for the waiting side.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    pub fn format(&self) -> DeviceFormat {
        self.format
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Decoded (non-silence) bytes copied to the device so far.
    pub fn bytes_emitted(&self) -> u64 {
        self.bytes_emitted
    }

    fn phase(&self) -> StreamPhase {
        if self.completion.is_set() {
            StreamPhase::Drained
        } else if self.pending.remaining > 0 {
            StreamPhase::HasData
        } else {
            StreamPhase::NeedsData
        }
    }

    /// Fill all of `out`, with decoded bytes first and silence after the stream ends.
    ///
    /// A decode that yields zero bytes ends the stream even if the decoder still reports
    /// `Ok`; there is no way to tell a transient empty read from exhaustion here.
    pub fn fill(&mut self, out: &mut [u8]) {
        if self.phase() == StreamPhase::Drained {
            out.fill(0);
            return;
        }

        let mut written = 0usize;
        while written < out.len() {
            if self.phase() == StreamPhase::NeedsData {
                let decoded = if self.decoder.status() == DecoderStatus::Ok {
                    self.decoder.decode()
                } else {
                    0
                };
                if decoded == 0 {
                    out[written..].fill(0);
                    self.completion.set();
                    tracing::debug!(
                        bytes_emitted = self.bytes_emitted,
                        status = ?self.decoder.status(),
                        "stream drained"
                    );
                    return;
                }
                self.pending = Pending {
                    offset: 0,
                    remaining: decoded,
                };
            }

            let n = (out.len() - written).min(self.pending.remaining);
            let start = self.pending.offset;
            out[written..written + n].copy_from_slice(&self.decoder.buffer()[start..start + n]);
            written += n;
            self.pending.offset += n;
            self.pending.remaining -= n;
            self.bytes_emitted += n as u64;
        }
    }

    /// Give up the decoder once the device has stopped calling back.
    pub fn into_decoder(self) -> D {
        self.decoder
    }
}
