//! Error types for video access.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`VideoBackend`](super::VideoBackend) or while cutting
/// its frames into wells.
#[derive(Error, Debug)]
pub enum VideoError {
    /// Video could not be opened
    #[error("Could not open video {path:?}: {message}")]
    Open { path: PathBuf, message: String },

    /// A single frame could not be decoded
    #[error("Could not read frame {frame} of {path:?}: {message}")]
    Read {
        path: PathBuf,
        frame: usize,
        message: String,
    },

    /// No frame of the video could be read
    #[error("No frames could be read from {path:?}")]
    NoFrames { path: PathBuf },

    /// Video carries no well definition
    #[error("Video {path:?} has no well definition")]
    MissingWellDefinition { path: PathBuf },

    /// Well bounds are empty or inverted, or a well name repeats
    #[error("Invalid geometry for well '{well}': {reason}")]
    InvalidGeometry { well: String, reason: String },
}
