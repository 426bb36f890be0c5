//! Data models for the well annotator.

mod label;
mod records;

pub use label::{Label, LabelCode, LabelVocabulary, UNANNOTATED, default_labels};
pub use records::{FileId, FileRecord, FileRegistry, WellAnnotation, WellGeometry, WellTable};
