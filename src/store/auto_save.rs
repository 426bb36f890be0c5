//! Periodic saving of an open store.
//!
//! Label edits only mark the session dirty; the navigator asks this timer on
//! every tick whether a save is due.

use std::fmt;
use std::time::Duration;
use web_time::Instant;

/// Why [`AutoSaveManager::due`] asked for a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// The annotator paused long enough after the last edit
    Quiet,
    /// Too many edits piled up while the annotator kept labeling
    EditLimit,
}

impl fmt::Display for SaveTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiet => f.write_str("quiet after edits"),
            Self::EditLimit => f.write_str("pending edit limit reached"),
        }
    }
}

/// Debounced save timer for label edits.
///
/// Two rules decide when a save is due:
/// 1. **Quiet**: the debounce delay has passed since the last edit, and the
///    minimum interval since the previous save.
/// 2. **Edit limit**: enough edits are pending that waiting for a pause
///    would risk too much work. Fast keyboard labeling never pauses, so
///    this bounds what a crash can lose.
#[derive(Debug)]
pub struct AutoSaveManager {
    /// Minimum interval between saves.
    save_interval: Duration,

    /// Quiet time required after the last edit.
    debounce_delay: Duration,

    /// Pending edits that force a save; `None` means no limit.
    edit_limit: Option<usize>,

    /// Time of the last save attempt.
    last_save: Option<Instant>,

    /// Time of the last edit not yet on disk.
    last_edit: Option<Instant>,

    /// Whether timed saves happen at all.
    enabled: bool,

    /// Label edits and rescans since the last successful save.
    pending_edits: usize,
}

impl AutoSaveManager {
    /// Default minimum interval between saves (60 seconds).
    pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(60);

    /// Default quiet time after the last edit (5 seconds).
    pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_secs(5);

    /// Default pending-edit limit, roughly a few plates of wells.
    pub const DEFAULT_EDIT_LIMIT: usize = 50;

    pub fn new() -> Self {
        Self {
            save_interval: Self::DEFAULT_SAVE_INTERVAL,
            debounce_delay: Self::DEFAULT_DEBOUNCE_DELAY,
            edit_limit: Some(Self::DEFAULT_EDIT_LIMIT),
            last_save: None,
            last_edit: None,
            enabled: true,
            pending_edits: 0,
        }
    }

    pub fn disabled() -> Self {
        let mut manager = Self::new();
        manager.enabled = false;
        manager
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Force a save once `limit` edits are pending. 0 removes the limit.
    pub fn with_edit_limit(mut self, limit: usize) -> Self {
        self.edit_limit = (limit > 0).then_some(limit);
        self
    }

    /// Record one change that has not reached disk yet.
    pub fn record_edit(&mut self) {
        self.pending_edits += 1;
        self.last_edit = Some(Instant::now());
        log::trace!("Auto-save: {} pending edits", self.pending_edits);
    }

    pub fn is_dirty(&self) -> bool {
        self.pending_edits > 0
    }

    /// Number of changes since the last successful save.
    pub fn pending_edits(&self) -> usize {
        self.pending_edits
    }

    /// Whether a save is due now, and why.
    pub fn due(&self) -> Option<SaveTrigger> {
        if !self.enabled || self.pending_edits == 0 {
            return None;
        }
        let interval_passed = self
            .last_save
            .is_none_or(|last_save| last_save.elapsed() >= self.save_interval);
        if !interval_passed {
            return None;
        }

        if self.edit_limit.is_some_and(|limit| self.pending_edits >= limit) {
            return Some(SaveTrigger::EditLimit);
        }
        let last_edit = self.last_edit?;
        (last_edit.elapsed() >= self.debounce_delay).then_some(SaveTrigger::Quiet)
    }

    /// The store was written, by the timer or explicitly.
    pub fn mark_saved(&mut self) {
        self.last_save = Some(Instant::now());
        self.pending_edits = 0;
        self.last_edit = None;
        log::trace!("Auto-save: store written");
    }

    /// A timed save failed; edits stay pending and the next attempt waits a
    /// full interval.
    pub fn mark_save_failed(&mut self) {
        self.last_save = Some(Instant::now());
        log::trace!("Auto-save: save failed, {} edits pending", self.pending_edits);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Forget all timing state, e.g. when another store is opened.
    pub fn reset(&mut self) {
        self.last_save = None;
        self.last_edit = None;
        self.pending_edits = 0;
    }
}

impl Default for AutoSaveManager {
    fn default() -> Self {
        Self::new()
    }
}
