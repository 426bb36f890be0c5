//! File registry and well annotation rows.
//!
//! These are the two persisted tables of an annotation store. Both are kept
//! as plain ordered vectors because every consumer walks them in order and
//! the collections are small (hundreds of files, tens of wells per file).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::label::{LabelCode, UNANNOTATED};

/// Stable identifier of a registered video file.
pub type FileId = u32;

/// One registered video file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique, never reassigned.
    pub file_id: FileId,
    /// Path relative to the store's working directory.
    pub filename: String,
}

impl FileRecord {
    pub fn new(file_id: FileId, filename: impl Into<String>) -> Self {
        Self {
            file_id,
            filename: filename.into(),
        }
    }
}

/// Ordered registry of video files.
///
/// Records are only ever appended. Rescans add new filenames with ids above
/// the current maximum and leave existing records untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    records: Vec<FileRecord>,
}

impl FileRegistry {
    /// Build a registry from discovered filenames, numbering them from 0 in
    /// discovery order.
    pub fn from_filenames<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = filenames
            .into_iter()
            .enumerate()
            .map(|(i, name)| FileRecord::new(i as FileId, name))
            .collect();
        Self { records }
    }

    /// Wrap already-numbered records, sorting them by id.
    ///
    /// Uniqueness is checked by [`FileRegistry::validate`], not here.
    pub fn from_records(mut records: Vec<FileRecord>) -> Self {
        records.sort_by_key(|r| r.file_id);
        Self { records }
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, file_id: FileId) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.file_id == file_id)
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.get(file_id).is_some()
    }

    /// Smallest registered id.
    pub fn first_id(&self) -> Option<FileId> {
        self.records.first().map(|r| r.file_id)
    }

    /// Largest registered id.
    pub fn max_id(&self) -> Option<FileId> {
        self.records.iter().map(|r| r.file_id).max()
    }

    /// Zero-based display position of a file.
    pub fn position(&self, file_id: FileId) -> Option<usize> {
        self.records.iter().position(|r| r.file_id == file_id)
    }

    /// The registered id immediately after `file_id` in display order.
    pub fn next_id(&self, file_id: FileId) -> Option<FileId> {
        self.records
            .iter()
            .map(|r| r.file_id)
            .filter(|&id| id > file_id)
            .min()
    }

    /// The registered id immediately before `file_id` in display order.
    pub fn prev_id(&self, file_id: FileId) -> Option<FileId> {
        self.records
            .iter()
            .map(|r| r.file_id)
            .filter(|&id| id < file_id)
            .max()
    }

    pub fn ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.records.iter().map(|r| r.file_id)
    }

    /// Append every filename not already registered, in the given order.
    ///
    /// New ids continue from the current maximum. Returns the records that
    /// were added (empty when nothing was new).
    pub fn merge_discovered<I, S>(&mut self, discovered: I) -> Vec<FileRecord>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: HashSet<String> = self.records.iter().map(|r| r.filename.clone()).collect();
        let mut next_id = self.max_id().map_or(0, |id| id + 1);
        let mut added = Vec::new();

        for name in discovered {
            let name = name.into();
            if !known.insert(name.clone()) {
                continue;
            }
            let record = FileRecord::new(next_id, name);
            next_id += 1;
            self.records.push(record.clone());
            added.push(record);
        }

        added
    }

    /// Check id and filename uniqueness.
    pub fn validate(&self) -> Result<(), String> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for record in &self.records {
            if !ids.insert(record.file_id) {
                return Err(format!("duplicate file_id {}", record.file_id));
            }
            if !names.insert(record.filename.as_str()) {
                return Err(format!("duplicate filename '{}'", record.filename));
            }
        }
        Ok(())
    }
}

/// Crop bounds of one well inside the full field of view, in pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellGeometry {
    pub well_name: String,
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
}

impl WellGeometry {
    pub fn new(well_name: impl Into<String>, x_min: i32, x_max: i32, y_min: i32, y_max: i32) -> Self {
        Self {
            well_name: well_name.into(),
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }
}

/// Persisted label row for one well of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellAnnotation {
    pub file_id: FileId,
    pub well_name: String,
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
    pub well_label: LabelCode,
}

impl WellAnnotation {
    /// Fresh, unannotated row for a well of `file_id`.
    pub fn unannotated(file_id: FileId, geometry: &WellGeometry) -> Self {
        Self {
            file_id,
            well_name: geometry.well_name.clone(),
            x_min: geometry.x_min,
            x_max: geometry.x_max,
            y_min: geometry.y_min,
            y_max: geometry.y_max,
            well_label: UNANNOTATED,
        }
    }

    pub fn is_annotated(&self) -> bool {
        self.well_label != UNANNOTATED
    }
}

/// The persisted per-well label table, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WellTable {
    rows: Vec<WellAnnotation>,
}

impl WellTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<WellAnnotation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[WellAnnotation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_file(&self, file_id: FileId) -> bool {
        self.rows.iter().any(|r| r.file_id == file_id)
    }

    /// Rows of one file, in table order.
    pub fn rows_for(&self, file_id: FileId) -> impl Iterator<Item = &WellAnnotation> + '_ {
        self.rows.iter().filter(move |r| r.file_id == file_id)
    }

    pub(crate) fn rows_for_mut(&mut self, file_id: FileId) -> impl Iterator<Item = &mut WellAnnotation> + '_ {
        self.rows.iter_mut().filter(move |r| r.file_id == file_id)
    }

    pub(crate) fn extend(&mut self, rows: impl IntoIterator<Item = WellAnnotation>) {
        self.rows.extend(rows);
    }

    /// Largest file id with at least one row.
    pub fn max_file_id(&self) -> Option<FileId> {
        self.rows.iter().map(|r| r.file_id).max()
    }

    /// Distinct file ids having at least one unannotated well, ascending.
    pub fn files_with_unannotated(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self
            .rows
            .iter()
            .filter(|r| !r.is_annotated())
            .map(|r| r.file_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Distinct file ids with at least one row, ascending.
    pub fn visited_files(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.rows.iter().map(|r| r.file_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn annotated_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_annotated()).count()
    }

    pub fn unannotated_count(&self) -> usize {
        self.rows.len() - self.annotated_count()
    }

    /// Check (`file_id`, `well_name`) uniqueness and that every row belongs
    /// to a registered file.
    pub fn validate(&self, registry: &FileRegistry) -> Result<(), String> {
        let mut seen = HashSet::new();
        for row in &self.rows {
            if !seen.insert((row.file_id, row.well_name.as_str())) {
                return Err(format!(
                    "duplicate well '{}' for file_id {}",
                    row.well_name, row.file_id
                ));
            }
            if !registry.contains(row.file_id) {
                return Err(format!(
                    "well '{}' refers to unregistered file_id {}",
                    row.well_name, row.file_id
                ));
            }
        }
        Ok(())
    }
}
