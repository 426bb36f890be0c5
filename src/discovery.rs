//! Discovery of candidate video files and store naming conventions.
//!
//! The session never walks the filesystem itself. It asks a
//! [`VideoDiscovery`] which directories are video roots, which files under
//! them are videos, and where the annotation store for a root lives.

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::constants::{
    AUXILIARY_DIR, FEATURES_SUFFIX, PRESTIM_MARKER, SCAN_ROOT_DIRS, STORE_SUFFIX, VIDEO_EXTENSION,
};
use crate::model::FileRegistry;

/// Naming conventions and file listing for a tree of videos.
pub trait VideoDiscovery {
    /// Whether `dir` is recognizable as a video root.
    fn is_scan_root(&self, dir: &Path) -> bool;

    /// All candidate videos under `working_dir`, as absolute paths, in a
    /// stable order.
    fn discover(&self, working_dir: &Path) -> Vec<PathBuf>;

    /// Directory where the store of `working_dir` lives.
    fn store_dir(&self, working_dir: &Path) -> PathBuf;

    /// File name for a brand-new store of `working_dir`.
    fn new_store_name(&self, working_dir: &Path) -> String;

    /// Widen filtering so files like those an existing store already
    /// registers are still discovered on rescan.
    fn match_registry(&mut self, _files: &FileRegistry) {}
}

/// Whether a path names an annotation store.
pub fn is_store_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(STORE_SUFFIX))
}

/// Recursively list every store under `dir`, sorted.
pub fn find_stores(dir: &Path) -> Vec<PathBuf> {
    let mut stores: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping unreadable entry under {:?}: {}", dir, e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_store_path(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    stores.sort();
    stores
}

/// Express discovered paths relative to `working_dir`.
///
/// Paths outside `working_dir` are kept as given.
pub fn relative_filenames(working_dir: &Path, paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            p.strip_prefix(working_dir)
                .unwrap_or(p)
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn is_root_name(name: &std::ffi::OsStr) -> bool {
    SCAN_ROOT_DIRS.iter().any(|d| name == *d)
}

/// Tierpsy output layout: `<project>/MaskedVideos/...` or
/// `<project>/Results/...`, with stores under `<project>/AuxiliaryFiles/...`.
#[derive(Debug, Clone)]
pub struct TierpsyLayout {
    /// Only list pre-stimulus recordings.
    pub prestim_only: bool,
}

impl TierpsyLayout {
    pub fn new(prestim_only: bool) -> Self {
        Self { prestim_only }
    }

    /// Parent of the nearest `MaskedVideos`/`Results` ancestor (inclusive).
    pub fn project_root(dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .find(|a| a.file_name().is_some_and(is_root_name))
            .and_then(|a| a.parent())
            .map(Path::to_path_buf)
    }

    fn is_results_root(dir: &Path) -> bool {
        dir.components()
            .any(|c| matches!(c, Component::Normal(name) if name == "Results"))
    }
}

impl Default for TierpsyLayout {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VideoDiscovery for TierpsyLayout {
    fn is_scan_root(&self, dir: &Path) -> bool {
        dir.components()
            .any(|c| matches!(c, Component::Normal(name) if is_root_name(name)))
    }

    fn discover(&self, working_dir: &Path) -> Vec<PathBuf> {
        let features_only = Self::is_results_root(working_dir);

        let mut videos: Vec<PathBuf> = WalkDir::new(working_dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Failed to scan under {:?}: {}", working_dir, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(VIDEO_EXTENSION))
            })
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                !name.ends_with("_wells_annotations.hdf5")
                    && (!features_only || name.ends_with(FEATURES_SUFFIX))
            })
            .filter(|path| !self.prestim_only || path.to_string_lossy().contains(PRESTIM_MARKER))
            .collect();

        videos.sort();
        log::info!(
            "Scanned {:?}: found {} videos{}",
            working_dir,
            videos.len(),
            if self.prestim_only { " (prestim only)" } else { "" }
        );
        videos
    }

    fn store_dir(&self, working_dir: &Path) -> PathBuf {
        working_dir
            .components()
            .map(|c| match c {
                Component::Normal(name) if is_root_name(name) => {
                    Component::Normal(std::ffi::OsStr::new(AUXILIARY_DIR))
                }
                other => other,
            })
            .collect()
    }

    fn new_store_name(&self, working_dir: &Path) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let project = Self::project_root(working_dir)
            .and_then(|root| root.file_name().map(|n| n.to_string_lossy().into_owned()));

        match project {
            Some(project) => format!("{}_{}{}", project, timestamp, STORE_SUFFIX),
            None => format!("{}{}", timestamp, STORE_SUFFIX),
        }
    }

    /// A store created without the prestim filter keeps growing without it.
    fn match_registry(&mut self, files: &FileRegistry) {
        if !self.prestim_only {
            return;
        }
        let other = files
            .records()
            .iter()
            .find(|r| !r.filename.contains(PRESTIM_MARKER));
        if let Some(record) = other {
            log::info!(
                "Store registers non-prestim video '{}', scanning all videos",
                record.filename
            );
            self.prestim_only = false;
        }
    }
}
