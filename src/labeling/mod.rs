//! Label assignment: manual set/unset/toggle and bulk classification.

mod classifier;
mod error;
mod protocol;

pub use classifier::{
    ClassifierMode, ClassifierReport, WellClassifier, WellFailure, available_modes,
};
pub(crate) use classifier::{FileOutcome, classify_file};
pub use error::{ClassifierError, LabelError};
pub use protocol::{LabelChange, LabelProtocol};
