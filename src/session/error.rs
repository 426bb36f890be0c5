//! Error types for the session navigator.

use thiserror::Error;

use crate::labeling::LabelError;
use crate::model::FileId;
use crate::store::StoreError;
use crate::video::VideoError;

/// Errors surfaced by [`Navigator`](super::Navigator) operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Operation needs an open store
    #[error("No annotation store loaded")]
    NothingLoaded,

    /// Operation needs an open file
    #[error("No video file open")]
    NoFileOpen,

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Stored well rows disagree with the wells read from the video.
    ///
    /// Never reconciled automatically: the video or its well definition
    /// changed on disk since the rows were written.
    #[error(
        "Well order mismatch for file_id {file_id}: stored {expected:?}, read {found:?}"
    )]
    WellOrderMismatch {
        file_id: FileId,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("File id {0} is not registered in the store")]
    UnknownFile(FileId),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Label(#[from] LabelError),
}
