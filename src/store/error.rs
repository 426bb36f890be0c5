//! Error types for annotation store operations.

use std::path::PathBuf;
use thiserror::Error;

/// Step of a save at which the write stopped.
///
/// Saves go to a temporary file that replaces the store only once complete,
/// so every stage before [`SaveStage::Replace`] leaves the previous store
/// contents intact on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    /// Encoding the document
    Encode,
    /// Writing the temporary file
    WriteTemp,
    /// Flushing the temporary file to disk
    Sync,
    /// Renaming the temporary file over the store
    Replace,
}

impl std::fmt::Display for SaveStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::Encode => "tables could not be encoded, nothing written",
            Self::WriteTemp => "temporary file could not be written, store unchanged",
            Self::Sync => "temporary file could not be flushed, store unchanged",
            Self::Replace => "temporary file written but could not replace the store",
        };
        f.write_str(msg)
    }
}

/// Errors that can occur while reading or writing an annotation store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error during file operations
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("Malformed store {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Path is neither a store nor a recognizable video root
    #[error("Invalid input {path:?}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    /// More than one store found where exactly one was expected
    #[error("More than one wells annotations file found in {dir:?}: {candidates:?}")]
    AmbiguousStore {
        dir: PathBuf,
        candidates: Vec<PathBuf>,
    },

    /// Scan root yielded no video files
    #[error("Could not find any video in {dir:?}")]
    NoFilesFound { dir: PathBuf },

    /// A required table is absent
    #[error("Store {path:?} is missing the '{table}' table")]
    MissingTable { path: PathBuf, table: &'static str },

    /// Tables are present but violate an invariant
    #[error("Store {path:?} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// Store written by an incompatible version
    #[error("Store {path:?} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// Save did not complete; see [`SaveStage`] for what reached the disk
    #[error("Save of {path:?} incomplete ({stage}): {message}")]
    PartialSave {
        path: PathBuf,
        stage: SaveStage,
        message: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn partial_save(
        path: impl Into<PathBuf>,
        stage: SaveStage,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::PartialSave {
            path: path.into(),
            stage,
            message: message.to_string(),
        }
    }
}
