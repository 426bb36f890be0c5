//! Navigator traversal, persistence and label scenarios.

use std::time::Duration;

use super::fakes::{FakeVideo, Fixture, three_wells};
use crate::config::AnnotatorConfig;
use crate::labeling::LabelError;
use crate::model::{FileId, FileRecord, LabelCode, WellGeometry};
use crate::session::{Dispatched, Navigator, Intent, Movement, NavigatorState, Resolution, SessionError};
use crate::store::{AutoSaveManager, ExportWarning, StoreHandle};
use crate::video::VideoError;

fn at(file_id: FileId, well_index: usize) -> NavigatorState {
    NavigatorState::FileOpen {
        file_id,
        well_index,
    }
}

fn stored_labels(fx: &Fixture, file_id: FileId) -> Vec<LabelCode> {
    StoreHandle::open(fx.store_path())
        .unwrap()
        .load()
        .unwrap()
        .wells
        .rows_for(file_id)
        .map(|r| r.well_label)
        .collect()
}

#[test]
fn test_fresh_store_opens_first_file() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    let mut nav = fx.navigator();
    assert_eq!(nav.state(), NavigatorState::NoFileOpen);

    let resolution = nav.open_store(fx.root()).unwrap();

    assert_eq!(resolution, Resolution::Untouched(0));
    assert_eq!(nav.state(), at(0, 0));
    assert_eq!(nav.store_path(), Some(fx.store_path().as_path()));
    assert_eq!(
        nav.contents().unwrap().files.records(),
        &[FileRecord::new(0, "a.hdf5"), FileRecord::new(1, "b.hdf5")]
    );

    let on_disk = StoreHandle::open(fx.store_path()).unwrap().load().unwrap();
    assert!(on_disk.wells.is_empty());

    let focus = nav.current_focus().unwrap();
    assert_eq!(focus.filename, "a.hdf5");
    assert_eq!(focus.well_name, "A1");
    assert_eq!(focus.label, 0);
    assert_eq!(nav.current_stack().unwrap().dim(), (4, 10, 10));
}

#[test]
fn test_wells_fall_through_to_neighbouring_files() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    let mut nav = fx.opened();

    nav.advance_well().unwrap();
    nav.advance_well().unwrap();
    assert_eq!(nav.state(), at(0, 2));
    assert_eq!(nav.advance_well().unwrap(), Movement::Moved);
    assert_eq!(nav.state(), at(1, 0));

    assert_eq!(nav.retreat_well().unwrap(), Movement::Moved);
    assert_eq!(nav.state(), at(0, 2));

    nav.retreat_well().unwrap();
    nav.retreat_well().unwrap();
    assert_eq!(nav.retreat_well().unwrap(), Movement::AtStart);
    assert_eq!(nav.state(), at(0, 0));

    nav.advance_file().unwrap();
    nav.advance_well().unwrap();
    nav.advance_well().unwrap();
    assert_eq!(nav.advance_well().unwrap(), Movement::AtEnd);
    assert_eq!(nav.state(), at(1, 2));
}

#[test]
fn test_labels_survive_file_switches_and_restart() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    let mut nav = fx.opened();

    nav.set_label(2).unwrap();
    nav.advance_file().unwrap();
    let labels: Vec<LabelCode> = nav
        .contents()
        .unwrap()
        .wells
        .rows_for(0)
        .map(|r| r.well_label)
        .collect();
    assert_eq!(labels, vec![2, 0, 0]);

    nav.retreat_file().unwrap();
    assert_eq!(nav.current_focus().unwrap().label, 2);
    nav.save().unwrap();
    assert_eq!(stored_labels(&fx, 0), vec![2, 0, 0]);

    let mut restarted = fx.navigator();
    assert_eq!(
        restarted.open_store(fx.root()).unwrap(),
        Resolution::Unannotated(0)
    );
    assert_eq!(restarted.current_focus().unwrap().label, 2);
}

#[test]
fn test_store_progress_is_idempotent() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.opened();
    nav.set_label(4).unwrap();

    assert!(nav.store_progress().unwrap());
    let once = nav.contents().unwrap().clone();
    assert!(!nav.store_progress().unwrap());
    assert_eq!(nav.contents().unwrap(), &once);

    nav.save().unwrap();
    let first = std::fs::read(fx.store_path()).unwrap();
    nav.save().unwrap();
    assert_eq!(std::fs::read(fx.store_path()).unwrap(), first);
}

#[test]
fn test_only_one_label_active() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.opened();

    nav.set_label(3).unwrap();
    let change = nav.set_label(5).unwrap();
    assert_eq!((change.previous, change.current), (3, 5));
    assert_eq!(nav.current_focus().unwrap().label, 5);

    let lit: Vec<LabelCode> = nav
        .current_indicators()
        .into_iter()
        .filter(|(_, on)| *on)
        .map(|(label, _)| label.code)
        .collect();
    assert_eq!(lit, vec![5]);

    assert!(!nav.unset_label(3).unwrap().changed());
    assert_eq!(nav.current_focus().unwrap().label, 5);
    nav.toggle_label(5).unwrap();
    assert_eq!(nav.current_focus().unwrap().label, 0);
}

#[test]
fn test_unknown_label_is_rejected() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.opened();

    let err = nav.set_label(12).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Label(LabelError::UnknownCode { code: 12, .. })
    ));
    assert_eq!(nav.current_focus().unwrap().label, 0);
    assert!(!nav.is_dirty());
}

#[test]
fn test_operations_need_a_store() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.navigator();

    assert!(matches!(nav.advance_well(), Err(SessionError::NothingLoaded)));
    assert!(matches!(nav.set_label(1), Err(SessionError::NothingLoaded)));
    assert!(matches!(nav.save(), Err(SessionError::NothingLoaded)));
    assert!(matches!(nav.rescan(), Err(SessionError::NothingLoaded)));
    assert!(nav.current_focus().is_none());
    assert!(!nav.autosave_tick().unwrap());
}

#[test]
fn test_rescan_is_additive() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.opened();

    fx.discovery.set(&["a.hdf5", "b.hdf5", "c.hdf5"]);
    let added = nav.rescan().unwrap();
    assert_eq!(
        added,
        vec![FileRecord::new(1, "b.hdf5"), FileRecord::new(2, "c.hdf5")]
    );
    assert!(nav.is_dirty());

    assert!(nav.rescan().unwrap().is_empty());
    assert_eq!(
        nav.contents().unwrap().files.records(),
        &[
            FileRecord::new(0, "a.hdf5"),
            FileRecord::new(1, "b.hdf5"),
            FileRecord::new(2, "c.hdf5"),
        ]
    );

    nav.save().unwrap();
    let on_disk = StoreHandle::open(fx.store_path()).unwrap().load().unwrap();
    assert_eq!(on_disk.files.len(), 3);
}

#[test]
fn test_reordered_wells_are_refused() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    let mut nav = fx.opened();
    nav.advance_file().unwrap();

    let mut reordered = three_wells();
    reordered.swap(0, 1);
    fx.backend.set(
        "a.hdf5",
        FakeVideo {
            wells: reordered,
            ..FakeVideo::default()
        },
    );

    let err = nav.open_file(0).unwrap_err();
    assert!(matches!(
        err,
        SessionError::WellOrderMismatch { file_id: 0, .. }
    ));
    assert_eq!(nav.state(), at(1, 0));
}

#[test]
fn test_unreadable_video_keeps_current_file() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    fx.backend.set(
        "b.hdf5",
        FakeVideo {
            broken: true,
            ..FakeVideo::default()
        },
    );
    let mut nav = fx.opened();
    nav.set_label(7).unwrap();

    assert!(matches!(nav.advance_file(), Err(SessionError::Video(_))));
    assert_eq!(nav.state(), at(0, 0));
    assert_eq!(nav.current_focus().unwrap().label, 7);

    assert!(matches!(nav.open_file(9), Err(SessionError::UnknownFile(9))));
}

#[test]
fn test_repeated_well_names_never_reach_the_store() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    fx.backend.set(
        "a.hdf5",
        FakeVideo {
            wells: vec![
                WellGeometry::new("A1", 0, 10, 0, 10),
                WellGeometry::new("A1", 10, 20, 0, 10),
            ],
            ..FakeVideo::default()
        },
    );
    let mut nav = fx.navigator();

    let err = nav.open_store(fx.root()).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Video(VideoError::InvalidGeometry { ref well, .. }) if well == "A1"
    ));
    assert_eq!(nav.state(), NavigatorState::NoFileOpen);

    nav.open_file(1).unwrap();
    nav.set_label(1).unwrap();
    nav.save().unwrap();

    let reopened = StoreHandle::open(fx.store_path()).unwrap().load().unwrap();
    assert!(reopened.wells.rows_for(0).next().is_none());
    assert_eq!(stored_labels(&fx, 1), vec![1, 0, 0]);
}

#[test]
fn test_review_moves_within_file_then_ahead() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5", "c.hdf5"]);
    let mut nav = fx.opened();

    nav.set_label(1).unwrap();
    assert_eq!(
        nav.jump_to_next_unannotated().unwrap(),
        Resolution::Unannotated(0)
    );
    assert_eq!(nav.state(), at(0, 1));

    nav.set_label(1).unwrap();
    nav.advance_well().unwrap();
    nav.set_label(1).unwrap();

    assert_eq!(
        nav.jump_to_next_unannotated().unwrap(),
        Resolution::Untouched(1)
    );
    assert_eq!(nav.state(), at(1, 0));
}

#[test]
fn test_review_wraps_to_earlier_unfinished_file() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5", "c.hdf5"]);
    let mut nav = fx.opened();
    nav.advance_file().unwrap();

    nav.set_label(1).unwrap();
    nav.advance_well().unwrap();
    nav.set_label(2).unwrap();
    nav.advance_well().unwrap();
    nav.set_label(1).unwrap();

    assert_eq!(
        nav.jump_to_next_unannotated().unwrap(),
        Resolution::Unannotated(0)
    );
    assert_eq!(nav.state(), at(0, 0));
}

#[test]
fn test_counters_and_progress() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    let mut nav = fx.opened();

    assert_eq!(nav.file_counter().as_deref(), Some("1/2"));
    assert_eq!(nav.well_counter().as_deref(), Some("1/3"));
    nav.advance_well().unwrap();
    assert_eq!(nav.well_counter().as_deref(), Some("2/3"));

    nav.set_label(1).unwrap();
    let progress = nav.progress().unwrap();
    assert_eq!(progress.files, 2);
    assert_eq!(progress.visited_files, 1);
    assert_eq!(progress.annotated_wells, 1);
    assert_eq!(progress.unannotated_wells, 2);
}

#[test]
fn test_dispatch_keys() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    let mut nav = fx.opened();
    let key = |c| Intent::from_key(c).unwrap();

    assert_eq!(
        nav.dispatch(key('=')).unwrap(),
        Dispatched::Moved(Movement::Moved)
    );
    match nav.dispatch(key('3')).unwrap() {
        Dispatched::Label(change) => assert_eq!(change.current, 3),
        other => panic!("unexpected outcome: {other:?}"),
    }
    match nav.dispatch(key('3')).unwrap() {
        Dispatched::Label(change) => assert_eq!(change.current, 0),
        other => panic!("unexpected outcome: {other:?}"),
    }
    nav.dispatch(key('8')).unwrap();

    nav.dispatch(key('>')).unwrap();
    assert_eq!(nav.state(), at(1, 0));
    assert_eq!(nav.dispatch(key('s')).unwrap(), Dispatched::Saved);
    assert_eq!(stored_labels(&fx, 0), vec![0, 8, 0]);
}

#[test]
fn test_autosave_after_edit() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.navigator().with_autosave(
        AutoSaveManager::new()
            .with_debounce_delay(Duration::ZERO)
            .with_save_interval(Duration::ZERO),
    );
    nav.open_store(fx.root()).unwrap();

    assert!(!nav.autosave_tick().unwrap());
    nav.set_label(4).unwrap();
    assert!(nav.autosave_tick().unwrap());
    assert_eq!(stored_labels(&fx, 0), vec![4, 0, 0]);
    assert!(!nav.is_dirty());
    assert!(!nav.autosave_tick().unwrap());
}

#[test]
fn test_close_without_saving_discards_edits() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.opened();
    nav.set_label(2).unwrap();

    nav.close(false).unwrap();
    assert_eq!(nav.state(), NavigatorState::NoFileOpen);
    assert!(nav.contents().is_none());
    assert!(stored_labels(&fx, 0).is_empty());

    assert_eq!(nav.open_store(fx.root()).unwrap(), Resolution::Untouched(0));
    nav.set_label(2).unwrap();
    nav.close(true).unwrap();
    assert_eq!(stored_labels(&fx, 0), vec![2, 0, 0]);
}

#[test]
fn test_export_from_session() {
    let fx = Fixture::new(&["a.hdf5", "b.hdf5"]);
    let mut nav = fx.opened();
    nav.set_label(1).unwrap();

    assert_eq!(
        nav.export_warnings().unwrap(),
        vec![
            ExportWarning::UnannotatedWells(2),
            ExportWarning::UnvisitedFiles(1)
        ]
    );

    let result = nav.export_csv(None).unwrap();
    assert_eq!(result.path, fx.store_path().with_extension("csv"));
    assert_eq!(result.rows_exported, 3);
    let csv = std::fs::read_to_string(&result.path).unwrap();
    assert!(csv.contains("A1,0,10,0,10,1,good"));
}

#[test]
fn test_frames_to_read_reloads_current_file() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut nav = fx.opened();
    nav.advance_well().unwrap();
    nav.set_label(6).unwrap();
    let opens = *fx.backend.opens.borrow();

    nav.set_frames_to_read(2).unwrap();

    assert_eq!(*fx.backend.opens.borrow(), opens + 1);
    assert_eq!(nav.frames_to_read(), 2);
    assert_eq!(nav.state(), at(0, 1));
    assert_eq!(nav.current_focus().unwrap().label, 6);
    assert_eq!(nav.current_stack().unwrap().dim(), (2, 10, 10));
}

#[test]
fn test_navigator_follows_config() {
    let fx = Fixture::new(&["a.hdf5"]);
    let mut config = AnnotatorConfig::new();
    config.preferences.frames_to_read = 3;
    config.preferences.autosave_debounce_secs = 0;
    config.preferences.autosave_edit_limit = 1;
    config.labels.retain(|label| label.code <= 2);

    let mut nav = Navigator::from_config(
        fx.backend.clone(),
        Box::new(fx.discovery.clone()),
        &config,
    )
    .unwrap();
    assert_eq!(nav.frames_to_read(), 3);
    assert_eq!(nav.vocabulary().labels().len(), 2);

    nav.open_store(fx.root()).unwrap();
    assert_eq!(nav.current_stack().unwrap().dim(), (3, 10, 10));
    assert!(matches!(
        nav.set_label(5),
        Err(SessionError::Label(LabelError::UnknownCode { code: 5, .. }))
    ));

    nav.set_label(2).unwrap();
    assert!(nav.autosave_tick().unwrap());
    assert_eq!(stored_labels(&fx, 0), vec![2, 0, 0]);
}
