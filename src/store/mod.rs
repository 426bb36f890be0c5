//! Durable annotation store.
//!
//! A store holds the registry of known video files, the per-well label
//! table and the working directory the registry's relative filenames
//! resolve against. It is read fully on load and replaced fully on save.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use well_annotator::discovery::TierpsyLayout;
//! use well_annotator::store::StoreHandle;
//!
//! let handle = StoreHandle::open_or_create(path, &TierpsyLayout::default())?;
//! let mut contents = handle.load()?;
//! // ... edit contents.wells ...
//! handle.save(&contents)?;
//! ```

mod auto_save;
mod document;
mod error;
mod export;
mod handle;

pub use auto_save::{AutoSaveManager, SaveTrigger};
pub use document::{FILES_TABLE, StoreContents, WELLS_TABLE};
pub use error::{SaveStage, StoreError};
pub use export::{
    ExportResult, ExportWarning, default_csv_path, export_csv, export_warnings, render_csv,
};
pub use handle::StoreHandle;
