//! Durable load and save of an annotation store.
//!
//! Every save is a complete write of both tables to a temporary file that is
//! then renamed over the store, so a concurrent reader sees either the old
//! or the new document, never a mix. Nothing is held open between calls.
//! Two processes saving the same store race as "last save wins"; there is no
//! locking.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::discovery::{VideoDiscovery, find_stores, is_store_path, relative_filenames};
use crate::model::FileRegistry;
use crate::store::document::{StoreContents, StoreDocument};
use crate::store::error::{SaveStage, StoreError};

/// Reference to an annotation store on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    path: PathBuf,
}

impl StoreHandle {
    /// Open an existing store file, checking that it parses and that both
    /// tables are present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !is_store_path(&path) {
            return Err(StoreError::invalid_input(
                &path,
                "please enter a wells annotations file (*_wells_annotations.json)",
            ));
        }
        let handle = Self { path };
        handle.load()?;
        log::info!("Opened annotation store {:?}", handle.path);
        Ok(handle)
    }

    /// Resolve `input` to a store.
    ///
    /// `input` is either an existing store file or a video root directory.
    /// For a directory, the store is looked up in the discovery's store
    /// directory and created from a fresh scan when there is none.
    pub fn open_or_create(input: &Path, discovery: &dyn VideoDiscovery) -> Result<Self, StoreError> {
        if input.is_file() {
            return Self::open(input);
        }
        if !input.is_dir() {
            return Err(StoreError::invalid_input(input, "path does not exist"));
        }
        if !discovery.is_scan_root(input) {
            return Err(StoreError::invalid_input(
                input,
                "directory is not a video root (should contain MaskedVideos or Results)",
            ));
        }

        let working_dir = std::path::absolute(input).unwrap_or_else(|_| input.to_path_buf());
        let store_dir = discovery.store_dir(&working_dir);
        let mut candidates = find_stores(&store_dir);

        match candidates.len() {
            0 => {
                let discovered = discovery.discover(&working_dir);
                let path = store_dir.join(discovery.new_store_name(&working_dir));
                Self::create_new(path, &working_dir, &discovered)
            }
            1 => Self::open(candidates.remove(0)),
            _ => Err(StoreError::AmbiguousStore {
                dir: store_dir,
                candidates,
            }),
        }
    }

    /// Write a brand-new store at `path` registering `discovered` (numbered
    /// from 0 in the given order) and an empty well table.
    pub fn create_new(
        path: impl Into<PathBuf>,
        working_dir: &Path,
        discovered: &[PathBuf],
    ) -> Result<Self, StoreError> {
        let path = path.into();
        if discovered.is_empty() {
            return Err(StoreError::NoFilesFound {
                dir: working_dir.to_path_buf(),
            });
        }
        if path.exists() {
            return Err(StoreError::invalid_input(&path, "a store already exists at this path"));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let files = FileRegistry::from_filenames(relative_filenames(working_dir, discovered));
        files
            .validate()
            .map_err(|message| StoreError::invalid_input(working_dir, message))?;
        let contents = StoreContents::new(files, working_dir.to_path_buf());

        let handle = Self { path };
        handle.save(&contents)?;
        log::info!(
            "Created annotation store {:?} with {} files from {:?}",
            handle.path,
            contents.files.len(),
            working_dir
        );
        Ok(handle)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the full store.
    pub fn load(&self) -> Result<StoreContents, StoreError> {
        let json = fs::read_to_string(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let contents = StoreDocument::parse(&self.path, &json)?.into_contents(&self.path)?;
        log::debug!(
            "Loaded {:?}: {} files, {} well rows",
            self.path,
            contents.files.len(),
            contents.wells.len()
        );
        Ok(contents)
    }

    /// Overwrite both tables and the working-directory marker.
    ///
    /// Contents that [`StoreHandle::load`] would refuse are rejected as
    /// [`StoreError::Corrupt`] before anything is written.
    pub fn save(&self, contents: &StoreContents) -> Result<(), StoreError> {
        let valid = contents
            .files
            .validate()
            .and_then(|()| contents.wells.validate(&contents.files));
        if let Err(message) = valid {
            return Err(StoreError::corrupt(
                &self.path,
                format!("refusing to save: {}", message),
            ));
        }

        let json = serde_json::to_string_pretty(&StoreDocument::from_contents(contents))
            .map_err(|e| StoreError::partial_save(&self.path, SaveStage::Encode, e))?;

        self.replace_with(json.as_bytes())?;
        log::info!(
            "Saved {:?}: {} files, {} well rows",
            self.path,
            contents.files.len(),
            contents.wells.len()
        );
        Ok(())
    }

    /// Write `bytes` to a sibling temporary file and rename it over the store.
    fn replace_with(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = self.temp_path();

        let result = (|| {
            let mut file = fs::File::create(&tmp)
                .map_err(|e| StoreError::partial_save(&self.path, SaveStage::WriteTemp, e))?;
            file.write_all(bytes)
                .map_err(|e| StoreError::partial_save(&self.path, SaveStage::WriteTemp, e))?;
            file.sync_all()
                .map_err(|e| StoreError::partial_save(&self.path, SaveStage::Sync, e))?;
            fs::rename(&tmp, &self.path)
                .map_err(|e| StoreError::partial_save(&self.path, SaveStage::Replace, e))
        })();

        if result.is_err() && tmp.exists() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    /// Recorded working directory.
    pub fn read_working_dir(&self) -> Result<PathBuf, StoreError> {
        Ok(self.load()?.working_dir)
    }

    /// Point the store at a new working directory without touching file or
    /// well records.
    ///
    /// The replaced directory is kept as the `previous_working_dir`
    /// breadcrumb; only the most recent one is kept. Returns the replaced
    /// directory.
    pub fn rebase(&self, new_working_dir: &Path) -> Result<PathBuf, StoreError> {
        if !new_working_dir.is_dir() {
            return Err(StoreError::invalid_input(
                new_working_dir,
                "new working directory not found",
            ));
        }

        let new_working_dir =
            std::path::absolute(new_working_dir).unwrap_or_else(|_| new_working_dir.to_path_buf());
        let mut contents = self.load()?;
        let old = std::mem::replace(&mut contents.working_dir, new_working_dir.clone());
        if !old.as_os_str().is_empty() {
            log::info!("Old working directory of {:?}: {:?}", self.path, old);
            contents.previous_working_dir = Some(old.clone());
        }
        self.save(&contents)?;
        log::info!("Rebased {:?} onto {:?}", self.path, new_working_dir);
        Ok(old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::TierpsyLayout;
    use crate::model::{FileRecord, WellAnnotation, WellGeometry, WellTable};

    fn project(dir: &Path) -> PathBuf {
        let root = dir.join("proj").join("MaskedVideos");
        for name in ["prestim_a/metadata.hdf5", "prestim_b/metadata.hdf5"] {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }
        root
    }

    #[test]
    fn test_create_new_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = project(dir.path());
        let store_path = dir.path().join("proj/AuxiliaryFiles/proj_1_wells_annotations.json");

        let discovered = vec![root.join("a.hdf5"), root.join("b.hdf5")];
        StoreHandle::create_new(&store_path, &root, &discovered).unwrap();

        let handle = StoreHandle::open_or_create(&root, &TierpsyLayout::default()).unwrap();
        assert_eq!(handle.path(), store_path);

        let contents = handle.load().unwrap();
        assert_eq!(
            contents.files.records(),
            &[FileRecord::new(0, "a.hdf5"), FileRecord::new(1, "b.hdf5")]
        );
        assert!(contents.wells.is_empty());
        assert_eq!(contents.working_dir, root);
    }

    #[test]
    fn test_create_new_requires_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreHandle::create_new(
            dir.path().join("x_wells_annotations.json"),
            dir.path(),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::NoFilesFound { .. }));
    }

    #[test]
    fn test_open_or_create_scans_fresh_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = project(dir.path());

        let handle = StoreHandle::open_or_create(&root, &TierpsyLayout::default()).unwrap();
        assert!(handle.path().starts_with(dir.path().join("proj/AuxiliaryFiles")));

        let contents = handle.load().unwrap();
        assert_eq!(contents.files.len(), 2);
        assert_eq!(contents.files.records()[0].filename, "prestim_a/metadata.hdf5");

        // Second open finds the same store instead of creating another
        let again = StoreHandle::open_or_create(&root, &TierpsyLayout::default()).unwrap();
        assert_eq!(again, handle);
    }

    #[test]
    fn test_open_or_create_rejects_unknown_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreHandle::open_or_create(dir.path(), &TierpsyLayout::default()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }

    #[test]
    fn test_open_or_create_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let root = project(dir.path());
        let aux = dir.path().join("proj/AuxiliaryFiles");
        fs::create_dir_all(&aux).unwrap();
        fs::write(aux.join("one_wells_annotations.json"), b"{}").unwrap();
        fs::write(aux.join("two_wells_annotations.json"), b"{}").unwrap();

        let err = StoreHandle::open_or_create(&root, &TierpsyLayout::default()).unwrap_err();
        match err {
            StoreError::AmbiguousStore { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_open_rejects_store_without_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_wells_annotations.json");
        fs::write(&path, r#"{"version": "0.1.0"}"#).unwrap();
        assert!(matches!(
            StoreHandle::open(&path).unwrap_err(),
            StoreError::MissingTable { .. }
        ));

        let other = dir.path().join("notes.json");
        fs::write(&other, "{}").unwrap();
        assert!(matches!(
            StoreHandle::open(&other).unwrap_err(),
            StoreError::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_save_roundtrip_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_wells_annotations.json");
        let handle =
            StoreHandle::create_new(&path, dir.path(), &[dir.path().join("a.hdf5")]).unwrap();

        let mut contents = handle.load().unwrap();
        contents.wells = WellTable::from_rows(vec![WellAnnotation {
            well_label: 3,
            ..WellAnnotation::unannotated(0, &WellGeometry::new("B2", 5, 15, 0, 10))
        }]);
        handle.save(&contents).unwrap();

        assert_eq!(handle.load().unwrap(), contents);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_save_into_missing_directory_reports_stage() {
        let dir = tempfile::tempdir().unwrap();
        let handle = StoreHandle {
            path: dir.path().join("gone/x_wells_annotations.json"),
        };
        let contents = StoreContents::new(FileRegistry::from_filenames(["a"]), dir.path().into());
        match handle.save(&contents).unwrap_err() {
            StoreError::PartialSave { stage, .. } => assert_eq!(stage, SaveStage::WriteTemp),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rebase_keeps_only_previous_directory() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let third = dir.path().join("third");
        for d in [&first, &second, &third] {
            fs::create_dir_all(d).unwrap();
        }
        let path = dir.path().join("x_wells_annotations.json");
        let handle = StoreHandle::create_new(&path, &first, &[first.join("a.hdf5")]).unwrap();

        assert_eq!(handle.rebase(&second).unwrap(), first);
        assert_eq!(handle.rebase(&third).unwrap(), second);

        let contents = handle.load().unwrap();
        assert_eq!(contents.working_dir, third);
        assert_eq!(contents.previous_working_dir, Some(second));
        assert_eq!(contents.files.records(), &[FileRecord::new(0, "a.hdf5")]);
        assert_eq!(handle.read_working_dir().unwrap(), third);
    }

    #[test]
    fn test_save_refuses_duplicate_wells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_wells_annotations.json");
        let handle =
            StoreHandle::create_new(&path, dir.path(), &[dir.path().join("a.hdf5")]).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let mut contents = handle.load().unwrap();
        contents.wells = WellTable::from_rows(vec![
            WellAnnotation::unannotated(0, &WellGeometry::new("A1", 0, 10, 0, 10)),
            WellAnnotation::unannotated(0, &WellGeometry::new("A1", 10, 20, 0, 10)),
        ]);
        let err = handle.save(&contents).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        // the store on disk is untouched and still loads
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert!(handle.load().unwrap().wells.is_empty());
    }

    #[test]
    fn test_rebase_records_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_wells_annotations.json");
        let handle =
            StoreHandle::create_new(&path, dir.path(), &[dir.path().join("a.hdf5")]).unwrap();

        // tests run from the package root, where `src` exists
        handle.rebase(Path::new("src")).unwrap();

        let working_dir = handle.read_working_dir().unwrap();
        assert!(working_dir.is_absolute());
        assert!(working_dir.ends_with("src"));
    }

    #[test]
    fn test_rebase_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_wells_annotations.json");
        let handle =
            StoreHandle::create_new(&path, dir.path(), &[dir.path().join("a.hdf5")]).unwrap();
        let err = handle.rebase(&dir.path().join("nowhere")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }
}
