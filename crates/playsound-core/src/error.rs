//! Error types for playback operations.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single `play` operation.
///
/// None of these are fatal to the caller: the operation aborts (or finishes) and the
/// error is handed back for reporting.
#[derive(Error, Debug)]
pub enum PlayError {
    /// The file could not be opened, probed or matched to a codec.
    #[error("Couldn't load '{}': {reason}", .path.display())]
    CannotOpenDecoder { path: PathBuf, reason: String },

    /// The output device rejected the requested format or failed to start.
    #[error("Couldn't open audio device: {reason}")]
    CannotOpenDevice { reason: String },

    /// The decoder flagged an error mid-stream. Playback ended early at that point.
    #[error("Error decoding '{}': {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
}

impl PlayError {
    pub(crate) fn open_decoder(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CannotOpenDecoder {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn open_device(reason: impl ToString) -> Self {
        Self::CannotOpenDevice {
            reason: reason.to_string(),
        }
    }
}

/// Convenience result alias for this crate.
pub type Result<T> = std::result::Result<T, PlayError>;
