//! Choosing which file to work on next.

use crate::model::{FileId, FileRegistry, WellTable};

/// File picked by [`resolve_next`], with the reason it was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The file still has unannotated wells.
    Unannotated(FileId),
    /// The file was never opened.
    Untouched(FileId),
    /// Every registered file is visited and annotated; wrapped to the first
    /// file.
    Complete(FileId),
}

impl Resolution {
    pub fn file_id(self) -> FileId {
        match self {
            Self::Unannotated(id) | Self::Untouched(id) | Self::Complete(id) => id,
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Next file to process.
///
/// Unfinished files come first, searching strictly after `after` and
/// wrapping around. Then the file following the last visited one, then any
/// other file never opened. Returns `None` only for an empty registry.
pub fn resolve_next(files: &FileRegistry, wells: &WellTable, after: Option<FileId>) -> Option<Resolution> {
    let first = files.first_id()?;

    if wells.is_empty() {
        return Some(Resolution::Untouched(first));
    }

    let unfinished = wells.files_with_unannotated();
    if let Some(&wrapped) = unfinished.first() {
        let ahead = after.and_then(|bound| unfinished.iter().copied().find(|&id| id > bound));
        return Some(Resolution::Unannotated(match after {
            None => wrapped,
            Some(_) => ahead.unwrap_or(wrapped),
        }));
    }

    let following = wells
        .max_file_id()
        .map(|id| id + 1)
        .filter(|&id| files.contains(id));
    if let Some(next) = following {
        return Some(Resolution::Untouched(next));
    }

    if let Some(untouched) = files.ids().find(|&id| !wells.contains_file(id)) {
        return Some(Resolution::Untouched(untouched));
    }

    Some(Resolution::Complete(first))
}
