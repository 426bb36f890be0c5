//! Well quality labels.
//!
//! A label is a positive integer code with a display name and a colour.
//! Code `0` is reserved for "not yet annotated" and never appears in a
//! vocabulary.

use serde::{Deserialize, Serialize};

/// Integer code stored in the `well_label` column.
pub type LabelCode = u32;

/// The reserved "not yet annotated" code.
pub const UNANNOTATED: LabelCode = 0;

/// One entry of the label vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Positive code written to the store
    pub code: LabelCode,
    /// Display name
    pub name: String,
    /// RGB colour of the label's indicator
    pub color: [u8; 3],
}

impl Label {
    pub fn new(code: LabelCode, name: &str, color: [u8; 3]) -> Self {
        Self {
            code,
            name: name.to_string(),
            color,
        }
    }
}

/// Fixed mapping from label codes to semantic names.
///
/// Injected into the session at construction time, so different experiment
/// types can use different vocabularies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<Label>,
    good: LabelCode,
}

impl LabelVocabulary {
    /// Build a vocabulary, checking that codes are positive and unique and
    /// that `good` is one of them.
    pub fn new(mut labels: Vec<Label>, good: LabelCode) -> Result<Self, String> {
        labels.sort_by_key(|l| l.code);
        if labels.is_empty() {
            return Err("label vocabulary is empty".to_string());
        }
        if labels.iter().any(|l| l.code == UNANNOTATED) {
            return Err(format!("label code {} is reserved", UNANNOTATED));
        }
        if let Some(pair) = labels.windows(2).find(|w| w[0].code == w[1].code) {
            return Err(format!("duplicate label code {}", pair[0].code));
        }
        if !labels.iter().any(|l| l.code == good) {
            return Err(format!("good label code {} is not in the vocabulary", good));
        }
        Ok(Self { labels, good })
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn get(&self, code: LabelCode) -> Option<&Label> {
        self.labels.iter().find(|l| l.code == code)
    }

    pub fn contains(&self, code: LabelCode) -> bool {
        self.get(code).is_some()
    }

    /// Code the bulk classifier promotes wells to.
    pub fn good(&self) -> LabelCode {
        self.good
    }

    /// Name shown for a stored code, including the unannotated state.
    pub fn meaning(&self, code: LabelCode) -> &str {
        self.get(code)
            .map(|l| l.name.as_str())
            .unwrap_or("not annotated")
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self {
            labels: default_labels(),
            good: 1,
        }
    }
}

/// The plate-quality vocabulary used for worm behaviour screens.
pub fn default_labels() -> Vec<Label> {
    vec![
        Label::new(1, "good", [0, 128, 0]),
        Label::new(2, "misaligned", [139, 0, 0]),
        Label::new(3, "precipitation", [255, 255, 0]),
        Label::new(4, "contamination", [165, 42, 42]),
        Label::new(5, "wet", [255, 0, 255]),
        Label::new(6, "bad agar", [0, 139, 139]),
        Label::new(7, "other bad", [255, 165, 0]),
        Label::new(8, "bad lawns", [128, 0, 128]),
        Label::new(9, "bad worms", [255, 0, 0]),
    ]
}
