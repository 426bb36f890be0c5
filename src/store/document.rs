//! On-disk layout of an annotation store.
//!
//! A store is a single JSON document holding the file registry (with the
//! working-directory marker attached to it) and the well annotation table.
//!
//! # Versioning
//!
//! The document uses semantic versioning (MAJOR.MINOR.PATCH):
//!
//! - **Version 0.x.x**: Unstable. Any 0.x document is read, but a different
//!   minor version is loaded with a warning.
//! - Other major versions are rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::{FileRecord, FileRegistry, WellAnnotation, WellTable};
use crate::store::error::StoreError;

/// Name of the file registry table.
pub const FILES_TABLE: &str = "filenames";

/// Name of the well annotation table.
pub const WELLS_TABLE: &str = "wells_annotations";

/// Complete, validated contents of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreContents {
    pub files: FileRegistry,
    pub wells: WellTable,
    /// Absolute directory the registry's filenames are relative to.
    pub working_dir: PathBuf,
    /// Working directory before the last rebase, if any.
    pub previous_working_dir: Option<PathBuf>,
}

impl StoreContents {
    /// Fresh contents: a registry and an empty well table.
    pub fn new(files: FileRegistry, working_dir: PathBuf) -> Self {
        Self {
            files,
            wells: WellTable::new(),
            working_dir,
            previous_working_dir: None,
        }
    }

    /// Absolute path of a registered file.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.working_dir.join(filename)
    }
}

/// File registry table with its directory attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FilesTable {
    pub working_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_working_dir: Option<PathBuf>,
    pub rows: Vec<FileRecord>,
}

/// Well annotation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WellsTable {
    pub rows: Vec<WellAnnotation>,
}

/// Serialized form of the whole store.
///
/// Both tables are optional here so a missing one is reported by name
/// rather than as a generic JSON error.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoreDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filenames: Option<FilesTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wells_annotations: Option<WellsTable>,
}

impl StoreDocument {
    /// Current version of the store format.
    pub const CURRENT_VERSION: &'static str = "0.1.0";

    /// Major version number for compatibility checking.
    pub const VERSION_MAJOR: u32 = 0;

    /// Minor version number.
    pub const VERSION_MINOR: u32 = 1;

    /// Parse a version string into (major, minor, patch) components.
    pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        let major = parts[0].parse().ok()?;
        let minor = parts[1].parse().ok()?;
        let patch = parts[2].parse().ok()?;
        Some((major, minor, patch))
    }

    /// For 0.x.x only an exact minor match is fully compatible.
    pub fn is_version_compatible(version: &str) -> bool {
        let Some((major, minor, _)) = Self::parse_version(version) else {
            return false;
        };
        if Self::VERSION_MAJOR == 0 {
            major == 0 && minor == Self::VERSION_MINOR
        } else {
            major == Self::VERSION_MAJOR
        }
    }

    /// Any document of the current major version can be attempted.
    pub fn is_version_readable(version: &str) -> bool {
        Self::parse_version(version).is_some_and(|(major, _, _)| major == Self::VERSION_MAJOR)
    }

    pub fn from_contents(contents: &StoreContents) -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
            filenames: Some(FilesTable {
                working_dir: contents.working_dir.clone(),
                previous_working_dir: contents.previous_working_dir.clone(),
                rows: contents.files.records().to_vec(),
            }),
            wells_annotations: Some(WellsTable {
                rows: contents.wells.rows().to_vec(),
            }),
        }
    }

    /// Parse and validate a store document read from `path`.
    pub fn parse(path: &Path, json: &str) -> Result<Self, StoreError> {
        let document: Self = serde_json::from_str(json).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        if !Self::is_version_readable(&document.version) {
            return Err(StoreError::VersionMismatch {
                path: path.to_path_buf(),
                expected: Self::CURRENT_VERSION.to_string(),
                found: document.version,
            });
        }
        if !Self::is_version_compatible(&document.version) {
            log::warn!(
                "Store {:?} has version {} which may not be fully compatible with {}",
                path,
                document.version,
                Self::CURRENT_VERSION
            );
        }

        if document.filenames.is_none() {
            return Err(StoreError::MissingTable {
                path: path.to_path_buf(),
                table: FILES_TABLE,
            });
        }
        if document.wells_annotations.is_none() {
            return Err(StoreError::MissingTable {
                path: path.to_path_buf(),
                table: WELLS_TABLE,
            });
        }

        Ok(document)
    }

    /// Convert into validated contents.
    pub fn into_contents(self, path: &Path) -> Result<StoreContents, StoreError> {
        let files_table = self.filenames.ok_or(StoreError::MissingTable {
            path: path.to_path_buf(),
            table: FILES_TABLE,
        })?;
        let wells_table = self.wells_annotations.ok_or(StoreError::MissingTable {
            path: path.to_path_buf(),
            table: WELLS_TABLE,
        })?;

        let files = FileRegistry::from_records(files_table.rows);
        files
            .validate()
            .map_err(|message| StoreError::corrupt(path, message))?;

        let wells = WellTable::from_rows(wells_table.rows);
        wells
            .validate(&files)
            .map_err(|message| StoreError::corrupt(path, message))?;

        Ok(StoreContents {
            files,
            wells,
            working_dir: files_table.working_dir,
            previous_working_dir: files_table.previous_working_dir,
        })
    }
}
