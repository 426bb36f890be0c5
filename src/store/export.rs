//! Spreadsheet export of a store.
//!
//! Produces one CSV row per known well, with the video path resolved against
//! the working directory and the label code spelled out.

use std::path::{Path, PathBuf};

use crate::model::LabelVocabulary;
use crate::store::document::StoreContents;
use crate::store::error::StoreError;

/// Reason an export might be incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportWarning {
    /// Some known wells still carry the unannotated code
    UnannotatedWells(usize),
    /// Some registered videos were never opened, so have no well rows
    UnvisitedFiles(usize),
}

impl std::fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnannotatedWells(n) => write!(f, "{} wells were not annotated", n),
            Self::UnvisitedFiles(n) => write!(f, "{} videos have not been annotated", n),
        }
    }
}

/// Summary of a finished export.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub path: PathBuf,
    pub rows_exported: usize,
    pub warnings: Vec<ExportWarning>,
}

/// Default CSV path: the store path with a `.csv` extension.
pub fn default_csv_path(store_path: &Path) -> PathBuf {
    store_path.with_extension("csv")
}

/// Checks a caller should confirm before exporting.
pub fn export_warnings(contents: &StoreContents) -> Vec<ExportWarning> {
    let mut warnings = Vec::new();

    let unannotated = contents.wells.unannotated_count();
    if unannotated > 0 {
        warnings.push(ExportWarning::UnannotatedWells(unannotated));
    }

    let unvisited = contents
        .files
        .ids()
        .filter(|&id| !contents.wells.contains_file(id))
        .count();
    if unvisited > 0 {
        warnings.push(ExportWarning::UnvisitedFiles(unvisited));
    }

    warnings
}

fn push_field(line: &mut String, field: &str) {
    if !line.is_empty() {
        line.push(',');
    }
    if field.contains([',', '"', '\n', '\r']) {
        line.push('"');
        line.push_str(&field.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(field);
    }
}

/// Render the export as CSV text.
pub fn render_csv(contents: &StoreContents, vocabulary: &LabelVocabulary) -> String {
    let rows: Vec<_> = contents
        .wells
        .rows()
        .iter()
        .filter_map(|row| Some((row, contents.files.get(row.file_id)?)))
        .collect();

    // imgstore videos are all named metadata.*, their folder names them
    let with_imgstore = !rows.is_empty()
        && rows.iter().all(|(_, record)| {
            Path::new(&record.filename)
                .file_name()
                .is_some_and(|n| n.to_string_lossy().contains("metadata"))
        });

    let mut out = String::new();
    let mut header = String::new();
    push_field(&mut header, "filename");
    if with_imgstore {
        push_field(&mut header, "imgstore_name");
    }
    for column in ["well_name", "x_min", "x_max", "y_min", "y_max", "well_label", "label_meaning"] {
        push_field(&mut header, column);
    }
    out.push_str(&header);
    out.push('\n');

    for (row, record) in rows {
        let full = contents.resolve(&record.filename);

        let mut line = String::new();
        push_field(&mut line, &full.to_string_lossy());
        if with_imgstore {
            let imgstore = full
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            push_field(&mut line, &imgstore);
        }
        push_field(&mut line, &row.well_name);
        line.push_str(&format!(
            ",{},{},{},{},{}",
            row.x_min, row.x_max, row.y_min, row.y_max, row.well_label
        ));
        push_field(&mut line, vocabulary.meaning(row.well_label));

        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// Write the CSV export to `path`.
pub fn export_csv(
    contents: &StoreContents,
    vocabulary: &LabelVocabulary,
    path: &Path,
) -> Result<ExportResult, StoreError> {
    let csv = render_csv(contents, vocabulary);
    std::fs::write(path, csv).map_err(|e| StoreError::io(path, e))?;

    let result = ExportResult {
        path: path.to_path_buf(),
        rows_exported: contents.wells.len(),
        warnings: export_warnings(contents),
    };
    log::info!("csv exported to {:?} ({} wells)", path, result.rows_exported);
    Ok(result)
}
