//! Rules for setting and clearing a single well's label.
//!
//! A well holds exactly one code at a time: `0` or a vocabulary code.
//! Setting a code replaces whatever was there; unsetting only clears the
//! code that is actually active, so a stale toggle from the interface can
//! never wipe a label that was set in the meantime.

use crate::model::{Label, LabelCode, LabelVocabulary, UNANNOTATED, WellAnnotation};

use super::error::LabelError;

/// Outcome of a label operation on one well.
///
/// The rendering layer uses `previous` to switch off the old indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelChange {
    pub well_name: String,
    pub previous: LabelCode,
    pub current: LabelCode,
}

impl LabelChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Label assignment with an injected vocabulary.
#[derive(Debug, Clone, Default)]
pub struct LabelProtocol {
    vocabulary: LabelVocabulary,
}

impl LabelProtocol {
    pub fn new(vocabulary: LabelVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    fn check(&self, well: &WellAnnotation, code: LabelCode) -> Result<(), LabelError> {
        if self.vocabulary.contains(code) {
            Ok(())
        } else {
            Err(LabelError::UnknownCode {
                code,
                well: well.well_name.clone(),
            })
        }
    }

    fn assign(well: &mut WellAnnotation, code: LabelCode) -> LabelChange {
        let previous = std::mem::replace(&mut well.well_label, code);
        LabelChange {
            well_name: well.well_name.clone(),
            previous,
            current: code,
        }
    }

    /// Make `code` the well's only label.
    pub fn set(&self, well: &mut WellAnnotation, code: LabelCode) -> Result<LabelChange, LabelError> {
        self.check(well, code)?;
        Ok(Self::assign(well, code))
    }

    /// Clear `code` if it is the active label, otherwise do nothing.
    pub fn unset(&self, well: &mut WellAnnotation, code: LabelCode) -> Result<LabelChange, LabelError> {
        self.check(well, code)?;
        if well.well_label == code {
            Ok(Self::assign(well, UNANNOTATED))
        } else {
            log::debug!(
                "Ignoring unset of {} on well '{}' (active label is {})",
                code,
                well.well_name,
                well.well_label
            );
            let current = well.well_label;
            Ok(Self::assign(well, current))
        }
    }

    /// Set `code`, or clear it when it is already active.
    pub fn toggle(&self, well: &mut WellAnnotation, code: LabelCode) -> Result<LabelChange, LabelError> {
        if well.well_label == code {
            self.unset(well, code)
        } else {
            self.set(well, code)
        }
    }

    /// Apply a classifier verdict: positive promotes to the good code,
    /// negative sends the well back for human review.
    pub fn apply_verdict(&self, well: &mut WellAnnotation, positive: bool) -> LabelChange {
        let code = if positive {
            self.vocabulary.good()
        } else {
            UNANNOTATED
        };
        Self::assign(well, code)
    }

    /// Every label with whether its indicator is lit for `well`.
    ///
    /// At most one entry is `true`.
    pub fn indicators<'a>(&'a self, well: &WellAnnotation) -> Vec<(&'a Label, bool)> {
        self.vocabulary
            .labels()
            .iter()
            .map(|label| (label, label.code == well.well_label))
            .collect()
    }
}
