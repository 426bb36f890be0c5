//! Discrete user intents and their default keys.

use crate::model::LabelCode;

/// An action requested by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    NextWell,
    PreviousWell,
    /// Jump to the next well that still needs a label
    NextToReview,
    NextFile,
    PreviousFile,
    Save,
    /// Set the label, or clear it when already active
    ToggleLabel(LabelCode),
}

impl Intent {
    /// Intent bound to a typed character, if any.
    ///
    /// Shifted and unshifted variants of a key map to the same intent, and
    /// digits `1`-`9` toggle the label with that code.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            '=' | '+' => Some(Self::NextWell),
            '-' | '_' => Some(Self::PreviousWell),
            ']' | '}' => Some(Self::NextToReview),
            '.' | '>' => Some(Self::NextFile),
            ',' | '<' => Some(Self::PreviousFile),
            's' | 'S' => Some(Self::Save),
            '1'..='9' => key.to_digit(10).map(Self::ToggleLabel),
            _ => None,
        }
    }
}
