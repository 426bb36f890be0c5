//! Session state machine over an annotation store.
//!
//! The navigator owns the loaded store contents and at most one
//! [`WorkingSet`]. Before any other file is opened, the open one is
//! committed into the persisted table, so paging through files never
//! drops labels. Saving is explicit, periodic via [`Navigator::autosave_tick`],
//! or a checkpoint of a classifier run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{AnnotatorConfig, ConfigError};
use crate::constants::DEFAULT_FRAMES_TO_READ;
use crate::discovery::{VideoDiscovery, relative_filenames};
use crate::labeling::{
    ClassifierMode, ClassifierReport, FileOutcome, LabelChange, LabelError, LabelProtocol,
    WellClassifier, available_modes, classify_file,
};
use crate::model::{FileId, FileRecord, Label, LabelCode, LabelVocabulary, WellAnnotation};
use crate::store::{
    AutoSaveManager, ExportResult, ExportWarning, StoreContents, StoreError, StoreHandle,
    default_csv_path, export_csv, export_warnings,
};
use crate::video::{ImageStack, VideoBackend, load_well_images};

use super::error::SessionError;
use super::intent::Intent;
use super::resolve::{Resolution, resolve_next};
use super::working_set::WorkingSet;

/// Where the navigator is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorState {
    NoFileOpen,
    FileOpen { file_id: FileId, well_index: usize },
}

/// Result of a step through wells or files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Moved,
    /// Already on the first well of the first file
    AtStart,
    /// Already on the last well of the last file
    AtEnd,
}

/// What the rendering layer shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Focus {
    pub file_id: FileId,
    pub filename: String,
    pub well_index: usize,
    pub well_name: String,
    pub label: LabelCode,
}

/// Annotation counts over the whole store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub files: usize,
    pub visited_files: usize,
    pub annotated_wells: usize,
    pub unannotated_wells: usize,
}

impl Progress {
    /// Counts of persisted contents only.
    pub fn of(contents: &StoreContents) -> Self {
        Self {
            files: contents.files.len(),
            visited_files: contents.wells.visited_files().len(),
            annotated_wells: contents.wells.annotated_count(),
            unannotated_wells: contents.wells.unannotated_count(),
        }
    }
}

/// Outcome of [`Navigator::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Moved(Movement),
    Review(Resolution),
    Label(LabelChange),
    Saved,
}

/// Add newly discovered files of the working directory to the registry.
///
/// Existing records are never touched. The discovery is first matched to
/// the registry, so a store holding non-prestim videos is rescanned without
/// the prestim filter. Returns the added records.
pub fn rescan_contents(
    contents: &mut StoreContents,
    discovery: &mut dyn VideoDiscovery,
) -> Vec<FileRecord> {
    discovery.match_registry(&contents.files);
    let discovered = discovery.discover(&contents.working_dir);
    let names = relative_filenames(&contents.working_dir, &discovered);
    let added = contents.files.merge_discovered(names);
    if added.is_empty() {
        log::info!("Rescan of {:?}: no new files", contents.working_dir);
    } else {
        log::info!(
            "Rescan of {:?}: {} new files, {} registered",
            contents.working_dir,
            added.len(),
            contents.files.len()
        );
    }
    added
}

struct OpenStore {
    handle: StoreHandle,
    contents: StoreContents,
    working: Option<WorkingSet>,
    well_index: usize,
}

/// Drives annotation of a store, one file and one well at a time.
pub struct Navigator<V: VideoBackend> {
    backend: V,
    discovery: Box<dyn VideoDiscovery>,
    protocol: LabelProtocol,
    frames_to_read: usize,
    autosave: AutoSaveManager,
    store: Option<OpenStore>,
}

impl<V: VideoBackend> Navigator<V> {
    pub fn new(backend: V, discovery: Box<dyn VideoDiscovery>, vocabulary: LabelVocabulary) -> Self {
        Self {
            backend,
            discovery,
            protocol: LabelProtocol::new(vocabulary),
            frames_to_read: DEFAULT_FRAMES_TO_READ,
            autosave: AutoSaveManager::new(),
            store: None,
        }
    }

    /// Navigator using the vocabulary, frame count and autosave policy of
    /// `config`.
    pub fn from_config(
        backend: V,
        discovery: Box<dyn VideoDiscovery>,
        config: &AnnotatorConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(backend, discovery, config.vocabulary()?)
            .with_frames_to_read(config.preferences.frames_to_read)
            .with_autosave(config.autosave()))
    }

    pub fn with_frames_to_read(mut self, frames: usize) -> Self {
        self.frames_to_read = frames.max(1);
        self
    }

    pub fn with_autosave(mut self, autosave: AutoSaveManager) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn backend(&self) -> &V {
        &self.backend
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        self.protocol.vocabulary()
    }

    pub fn frames_to_read(&self) -> usize {
        self.frames_to_read
    }

    /// Loaded store contents, without the open file's uncommitted edits.
    pub fn contents(&self) -> Option<&StoreContents> {
        self.store.as_ref().map(|s| &s.contents)
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_ref().map(|s| s.handle.path())
    }

    pub fn working_set(&self) -> Option<&WorkingSet> {
        self.store.as_ref().and_then(|s| s.working.as_ref())
    }

    /// Unsaved label edits or registry changes are pending.
    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }

    fn loaded(&self) -> Result<&OpenStore, SessionError> {
        self.store.as_ref().ok_or(SessionError::NothingLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut OpenStore, SessionError> {
        self.store.as_mut().ok_or(SessionError::NothingLoaded)
    }

    fn current_file_id(&self) -> Option<FileId> {
        self.working_set().map(WorkingSet::file_id)
    }

    pub fn state(&self) -> NavigatorState {
        match self.store.as_ref() {
            Some(OpenStore {
                working: Some(ws),
                well_index,
                ..
            }) => NavigatorState::FileOpen {
                file_id: ws.file_id(),
                well_index: *well_index,
            },
            _ => NavigatorState::NoFileOpen,
        }
    }

    pub fn current_focus(&self) -> Option<Focus> {
        let store = self.store.as_ref()?;
        let ws = store.working.as_ref()?;
        let well = ws.well(store.well_index)?;
        let record = store.contents.files.get(ws.file_id())?;
        Some(Focus {
            file_id: ws.file_id(),
            filename: record.filename.clone(),
            well_index: store.well_index,
            well_name: well.well_name.clone(),
            label: well.well_label,
        })
    }

    /// Image stack of the focused well.
    pub fn current_stack(&self) -> Option<&ImageStack> {
        let store = self.store.as_ref()?;
        let ws = store.working.as_ref()?;
        ws.stack(&ws.well(store.well_index)?.well_name)
    }

    /// Label indicators of the focused well; at most one is lit.
    pub fn current_indicators(&self) -> Vec<(&Label, bool)> {
        let store = self.store.as_ref();
        let well = store.and_then(|s| s.working.as_ref()?.well(s.well_index));
        match well {
            Some(well) => self.protocol.indicators(well),
            None => Vec::new(),
        }
    }

    /// Open (or create) a store and its first file to process.
    ///
    /// A store already loaded is committed and saved first.
    pub fn open_store(&mut self, input: &Path) -> Result<Resolution, SessionError> {
        if self.store.is_some() {
            self.close(true)?;
        }

        let handle = StoreHandle::open_or_create(input, self.discovery.as_ref())?;
        let contents = handle.load()?;
        let resolution = resolve_next(&contents.files, &contents.wells, None).ok_or_else(|| {
            StoreError::NoFilesFound {
                dir: contents.working_dir.clone(),
            }
        })?;

        log::info!(
            "Loaded {:?}: {} files, resuming at file_id {} ({:?})",
            handle.path(),
            contents.files.len(),
            resolution.file_id(),
            resolution
        );
        self.autosave.reset();
        self.store = Some(OpenStore {
            handle,
            contents,
            working: None,
            well_index: 0,
        });

        self.open_file(resolution.file_id())?;
        Ok(resolution)
    }

    /// Commit the open file and switch to `file_id`, focusing its first well.
    ///
    /// On failure the navigator stays on the previous file, which is already
    /// committed.
    pub fn open_file(&mut self, file_id: FileId) -> Result<(), SessionError> {
        let store = self.store.as_mut().ok_or(SessionError::NothingLoaded)?;
        let filename = store
            .contents
            .files
            .get(file_id)
            .ok_or(SessionError::UnknownFile(file_id))?
            .filename
            .clone();

        if let Some(ws) = &store.working {
            ws.commit_into(&mut store.contents.wells)?;
        }

        let path = store.contents.resolve(&filename);
        let images = load_well_images(&mut self.backend, &path, self.frames_to_read)?;
        let ws = WorkingSet::build(file_id, &store.contents.wells, &images.geometry)?
            .with_images(images);

        log::info!("Opened file_id {} ({}): {} wells", file_id, filename, ws.len());
        store.working = Some(ws);
        store.well_index = 0;
        Ok(())
    }

    pub fn advance_well(&mut self) -> Result<Movement, SessionError> {
        let store = self.loaded_mut()?;
        let len = store.working.as_ref().ok_or(SessionError::NoFileOpen)?.len();
        if store.well_index + 1 < len {
            store.well_index += 1;
            return Ok(Movement::Moved);
        }
        self.advance_file()
    }

    /// Previous well, or the last well of the previous file.
    pub fn retreat_well(&mut self) -> Result<Movement, SessionError> {
        let store = self.loaded_mut()?;
        store.working.as_ref().ok_or(SessionError::NoFileOpen)?;
        if store.well_index > 0 {
            store.well_index -= 1;
            return Ok(Movement::Moved);
        }

        let movement = self.retreat_file()?;
        if movement == Movement::Moved {
            let store = self.loaded_mut()?;
            let len = store.working.as_ref().map_or(0, WorkingSet::len);
            store.well_index = len.saturating_sub(1);
        }
        Ok(movement)
    }

    /// Next registered file. The end of the list is reported, not wrapped.
    pub fn advance_file(&mut self) -> Result<Movement, SessionError> {
        let current = self.current_file_id();
        let files = &self.loaded()?.contents.files;
        let target = match current {
            Some(id) => files.next_id(id),
            None => files.first_id(),
        };
        match target {
            Some(id) => {
                self.open_file(id)?;
                Ok(Movement::Moved)
            }
            None => Ok(Movement::AtEnd),
        }
    }

    pub fn retreat_file(&mut self) -> Result<Movement, SessionError> {
        let current = self.current_file_id();
        let files = &self.loaded()?.contents.files;
        let target = match current {
            Some(id) => files.prev_id(id),
            None => files.first_id(),
        };
        match target {
            Some(id) => {
                self.open_file(id)?;
                Ok(Movement::Moved)
            }
            None => Ok(Movement::AtStart),
        }
    }

    /// Register videos that appeared in the working directory since the
    /// store was created.
    pub fn rescan(&mut self) -> Result<Vec<FileRecord>, SessionError> {
        let store = self.store.as_mut().ok_or(SessionError::NothingLoaded)?;
        let added = rescan_contents(&mut store.contents, self.discovery.as_mut());
        if !added.is_empty() {
            self.autosave.record_edit();
        }
        Ok(added)
    }

    /// Move to the next well still needing a label.
    ///
    /// Looks after the focused well in the open file first, then at other
    /// files via [`resolve_next`], searching ahead of the open file.
    pub fn jump_to_next_unannotated(&mut self) -> Result<Resolution, SessionError> {
        self.store_progress()?;

        let store = self.loaded_mut()?;
        let in_file = store.working.as_ref().and_then(|ws| {
            ws.next_unannotated_after(store.well_index)
                .map(|index| (ws.file_id(), index))
        });
        if let Some((file_id, index)) = in_file {
            store.well_index = index;
            return Ok(Resolution::Unannotated(file_id));
        }

        let current = store.working.as_ref().map(WorkingSet::file_id);
        let resolution = resolve_next(&store.contents.files, &store.contents.wells, current)
            .ok_or(SessionError::NothingLoaded)?;
        if resolution.is_complete() {
            log::info!("All registered files are annotated");
        }

        if current != Some(resolution.file_id()) {
            self.open_file(resolution.file_id())?;
        }
        let store = self.loaded_mut()?;
        if let Some(ws) = &store.working {
            store.well_index = ws.first_unannotated().unwrap_or(0);
        }
        Ok(resolution)
    }

    /// Merge the open file's labels into the loaded table.
    ///
    /// Returns whether the table changed.
    pub fn store_progress(&mut self) -> Result<bool, SessionError> {
        let store = self.loaded_mut()?;
        match &store.working {
            Some(ws) => ws.commit_into(&mut store.contents.wells),
            None => Ok(false),
        }
    }

    /// Commit the open file and write the store.
    pub fn save(&mut self) -> Result<(), SessionError> {
        self.store_progress()?;
        let store = self.loaded()?;
        store.handle.save(&store.contents)?;
        self.autosave.mark_saved();
        Ok(())
    }

    /// Commit, optionally save, and unload the store.
    pub fn close(&mut self, save: bool) -> Result<(), SessionError> {
        self.store_progress()?;
        if save {
            self.save()?;
        } else if self.autosave.is_dirty() {
            log::warn!(
                "Closing {:?} with {} unsaved edits",
                self.store_path(),
                self.autosave.pending_edits()
            );
        }
        self.store = None;
        self.autosave.reset();
        Ok(())
    }

    /// Save when the autosave timer says so. Returns whether a save ran.
    pub fn autosave_tick(&mut self) -> Result<bool, SessionError> {
        if self.store.is_none() {
            return Ok(false);
        }
        let Some(trigger) = self.autosave.due() else {
            return Ok(false);
        };
        match self.save() {
            Ok(()) => {
                log::debug!("Autosaved {:?} ({})", self.store_path(), trigger);
                Ok(true)
            }
            Err(e) => {
                self.autosave.mark_save_failed();
                log::warn!("Autosave failed: {}", e);
                Err(e)
            }
        }
    }

    fn apply_label(
        &mut self,
        op: impl FnOnce(&LabelProtocol, &mut WellAnnotation) -> Result<LabelChange, LabelError>,
    ) -> Result<LabelChange, SessionError> {
        let store = self.store.as_mut().ok_or(SessionError::NothingLoaded)?;
        let index = store.well_index;
        let well = store
            .working
            .as_mut()
            .and_then(|ws| ws.well_mut(index))
            .ok_or(SessionError::NoFileOpen)?;

        let change = op(&self.protocol, well)?;
        if change.changed() {
            log::debug!(
                "Well '{}': {} -> {}",
                change.well_name,
                change.previous,
                change.current
            );
            self.autosave.record_edit();
        }
        Ok(change)
    }

    pub fn set_label(&mut self, code: LabelCode) -> Result<LabelChange, SessionError> {
        self.apply_label(|protocol, well| protocol.set(well, code))
    }

    pub fn unset_label(&mut self, code: LabelCode) -> Result<LabelChange, SessionError> {
        self.apply_label(|protocol, well| protocol.unset(well, code))
    }

    pub fn toggle_label(&mut self, code: LabelCode) -> Result<LabelChange, SessionError> {
        self.apply_label(|protocol, well| protocol.toggle(well, code))
    }

    /// Classifier modes worth offering for the current annotations.
    pub fn available_classifier_modes(&mut self) -> Result<Vec<ClassifierMode>, SessionError> {
        self.store_progress()?;
        Ok(available_modes(&self.loaded()?.contents.wells))
    }

    /// Label every registered file with `classifier`, in ascending file id.
    ///
    /// The store is saved after each file. `cancel` is checked between
    /// wells; a cancelled file keeps the labels it had before the run.
    /// Files whose video cannot be read are skipped and reported. Afterwards
    /// the navigator returns to the well it was on.
    pub fn run_classifier(
        &mut self,
        classifier: &mut dyn WellClassifier,
        mode: ClassifierMode,
        cancel: &AtomicBool,
    ) -> Result<ClassifierReport, SessionError> {
        self.store_progress()?;
        let store = self.loaded()?;
        let resume = store
            .working
            .as_ref()
            .map(|ws| (ws.file_id(), store.well_index));
        let ids: Vec<FileId> = store.contents.files.ids().collect();

        log::info!("Running classifier ({:?}) over {} files", mode, ids.len());
        let mut report = ClassifierReport::default();

        for file_id in ids {
            if cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }

            match self.open_file(file_id) {
                Ok(()) => {}
                Err(SessionError::Video(e)) => {
                    log::warn!("Classifier skipping file_id {}: {}", file_id, e);
                    report.files_failed.push((file_id, e.to_string()));
                    continue;
                }
                Err(e) => return Err(e),
            }

            let store = self.store.as_mut().ok_or(SessionError::NothingLoaded)?;
            let Some(ws) = store.working.as_mut() else {
                continue;
            };
            let (wells, images) = ws.parts_mut();
            let Some(images) = images else {
                continue;
            };

            let outcome = classify_file(
                wells,
                images,
                classifier,
                &self.protocol,
                mode,
                cancel,
                &mut report,
            );
            if outcome == FileOutcome::Cancelled {
                log::info!("Classifier cancelled during file_id {}", file_id);
                // labels are back to their stored values; drop without committing
                store.working = None;
                report.cancelled = true;
                break;
            }

            self.save()?;
            report.files_processed += 1;
            log::info!("Classifier checkpoint: file_id {} saved", file_id);
        }

        if let Some((file_id, well_index)) = resume {
            if self.current_file_id() != Some(file_id) {
                self.open_file(file_id)?;
            }
            let store = self.loaded_mut()?;
            let len = store.working.as_ref().map_or(0, WorkingSet::len);
            store.well_index = well_index.min(len.saturating_sub(1));
        }

        log::info!(
            "Classifier finished: {} files, {} wells classified, {} promoted, {} failures{}",
            report.files_processed,
            report.wells_classified,
            report.wells_promoted,
            report.failures.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    /// Change how many frames are sampled per video, reloading the open
    /// file at the same well.
    pub fn set_frames_to_read(&mut self, frames: usize) -> Result<(), SessionError> {
        self.frames_to_read = frames.max(1);
        if let NavigatorState::FileOpen {
            file_id,
            well_index,
        } = self.state()
        {
            self.open_file(file_id)?;
            let store = self.loaded_mut()?;
            let len = store.working.as_ref().map_or(0, WorkingSet::len);
            store.well_index = well_index.min(len.saturating_sub(1));
        }
        Ok(())
    }

    /// `"i/N"`: 1-based position of the open file among registered files.
    pub fn file_counter(&self) -> Option<String> {
        let store = self.store.as_ref()?;
        let file_id = store.working.as_ref()?.file_id();
        let position = store.contents.files.position(file_id)?;
        Some(format!("{}/{}", position + 1, store.contents.files.len()))
    }

    /// `"j/M"`: 1-based position of the focused well in the open file.
    pub fn well_counter(&self) -> Option<String> {
        let store = self.store.as_ref()?;
        let ws = store.working.as_ref()?;
        Some(format!("{}/{}", store.well_index + 1, ws.len()))
    }

    /// Counts including the open file's uncommitted labels.
    pub fn progress(&self) -> Option<Progress> {
        let store = self.store.as_ref()?;
        let mut progress = Progress::of(&store.contents);
        let Some(ws) = store.working.as_ref() else {
            return Some(progress);
        };

        let stored: Vec<&WellAnnotation> = store.contents.wells.rows_for(ws.file_id()).collect();
        if stored.is_empty() {
            progress.visited_files += 1;
        }
        let stored_annotated = stored.iter().filter(|r| r.is_annotated()).count();
        progress.annotated_wells = progress.annotated_wells - stored_annotated + ws.annotated_count();
        progress.unannotated_wells = progress.unannotated_wells - (stored.len() - stored_annotated)
            + (ws.len() - ws.annotated_count());
        Some(progress)
    }

    /// Export issues the caller may want confirmed first.
    pub fn export_warnings(&mut self) -> Result<Vec<ExportWarning>, SessionError> {
        self.store_progress()?;
        Ok(export_warnings(&self.loaded()?.contents))
    }

    /// Write the CSV export; defaults to the store path with `.csv`.
    pub fn export_csv(&mut self, path: Option<&Path>) -> Result<ExportResult, SessionError> {
        self.store_progress()?;
        let store = self.loaded()?;
        let path: PathBuf = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_csv_path(store.handle.path()));
        Ok(export_csv(&store.contents, self.protocol.vocabulary(), &path)?)
    }

    /// Perform a user intent.
    pub fn dispatch(&mut self, intent: Intent) -> Result<Dispatched, SessionError> {
        match intent {
            Intent::NextWell => self.advance_well().map(Dispatched::Moved),
            Intent::PreviousWell => self.retreat_well().map(Dispatched::Moved),
            Intent::NextToReview => self.jump_to_next_unannotated().map(Dispatched::Review),
            Intent::NextFile => self.advance_file().map(Dispatched::Moved),
            Intent::PreviousFile => self.retreat_file().map(Dispatched::Moved),
            Intent::Save => self.save().map(|()| Dispatched::Saved),
            Intent::ToggleLabel(code) => self.toggle_label(code).map(Dispatched::Label),
        }
    }
}
