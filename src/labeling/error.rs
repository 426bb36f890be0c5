//! Error types for label assignment.

use thiserror::Error;

use crate::model::LabelCode;

/// Rejected label operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    /// Code is not part of the injected vocabulary
    #[error("Label code {code} is not in the vocabulary (well '{well}')")]
    UnknownCode { code: LabelCode, well: String },
}

/// Failure of a single classifier call.
///
/// Never aborts a batch run; the well keeps its previous label.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Classifier inference failed: {message}")]
pub struct ClassifierError {
    pub message: String,
}

impl ClassifierError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
