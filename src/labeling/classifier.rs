//! Bulk labeling with an automatic well classifier.
//!
//! The classifier only answers good or not good. A positive verdict promotes
//! a well to the vocabulary's good code, a negative one leaves it for human
//! review. Specific bad-well reasons are never assigned automatically.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{FileId, LabelCode, WellAnnotation, WellTable};
use crate::video::{ImageStack, WellImages};

use super::error::ClassifierError;
use super::protocol::LabelProtocol;

/// Black-box good/bad decision on one well's image stack.
pub trait WellClassifier {
    fn classify(&mut self, stack: &ImageStack) -> Result<bool, ClassifierError>;
}

impl<F> WellClassifier for F
where
    F: FnMut(&ImageStack) -> Result<bool, ClassifierError>,
{
    fn classify(&mut self, stack: &ImageStack) -> Result<bool, ClassifierError> {
        self(stack)
    }
}

/// Which wells a bulk run may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierMode {
    /// Classify every well, replacing existing labels
    OverwriteAll,
    /// Classify only wells that are still unannotated
    FillGaps,
}

impl ClassifierMode {
    fn should_classify(self, well: &WellAnnotation) -> bool {
        match self {
            Self::OverwriteAll => true,
            Self::FillGaps => !well.is_annotated(),
        }
    }
}

/// Modes worth offering for the current table.
///
/// With no annotated well there is nothing to overwrite, so only
/// [`ClassifierMode::OverwriteAll`] is returned and the caller need not ask.
/// [`ClassifierMode::FillGaps`] is offered when some known well is still
/// unannotated. Declining every offered mode aborts the run.
pub fn available_modes(wells: &WellTable) -> Vec<ClassifierMode> {
    if wells.annotated_count() == 0 {
        return vec![ClassifierMode::OverwriteAll];
    }
    let mut modes = vec![ClassifierMode::OverwriteAll];
    if wells.unannotated_count() > 0 {
        modes.push(ClassifierMode::FillGaps);
    }
    modes
}

/// A well whose classification failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellFailure {
    pub file_id: FileId,
    pub well_name: String,
    pub message: String,
}

/// Summary of a bulk run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierReport {
    /// Files fully processed and checkpointed
    pub files_processed: usize,
    pub wells_classified: usize,
    pub wells_promoted: usize,
    /// Wells left alone because of the mode
    pub wells_skipped: usize,
    pub failures: Vec<WellFailure>,
    /// Files that could not be opened or checkpointed, with the reason
    pub files_failed: Vec<(FileId, String)>,
    pub cancelled: bool,
}

/// Result of classifying one file's wells.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Done,
    /// Stopped between wells; labels already restored
    Cancelled,
}

/// Classify the wells of one open file in order.
///
/// Checks `cancel` before every well. When set, every label of `wells` is
/// put back to its value from before this call.
pub(crate) fn classify_file(
    wells: &mut [WellAnnotation],
    images: &WellImages,
    classifier: &mut dyn WellClassifier,
    protocol: &LabelProtocol,
    mode: ClassifierMode,
    cancel: &AtomicBool,
    report: &mut ClassifierReport,
) -> FileOutcome {
    let snapshot: Vec<LabelCode> = wells.iter().map(|w| w.well_label).collect();

    let mut cancelled = false;
    for well in wells.iter_mut() {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }

        if !mode.should_classify(well) {
            report.wells_skipped += 1;
            continue;
        }

        let Some(stack) = images.stack(&well.well_name) else {
            log::warn!(
                "No images for well '{}' of file {}, label left unchanged",
                well.well_name,
                well.file_id
            );
            report.failures.push(WellFailure {
                file_id: well.file_id,
                well_name: well.well_name.clone(),
                message: "no images for well".to_string(),
            });
            continue;
        };

        match classifier.classify(stack) {
            Ok(positive) => {
                protocol.apply_verdict(well, positive);
                report.wells_classified += 1;
                if positive {
                    report.wells_promoted += 1;
                }
            }
            Err(e) => {
                log::warn!(
                    "Classifier failed on well '{}' of file {}: {}",
                    well.well_name,
                    well.file_id,
                    e
                );
                report.failures.push(WellFailure {
                    file_id: well.file_id,
                    well_name: well.well_name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    if cancelled {
        for (well, label) in wells.iter_mut().zip(snapshot) {
            well.well_label = label;
        }
        return FileOutcome::Cancelled;
    }
    FileOutcome::Done
}
