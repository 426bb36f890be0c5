//! The open file's well table.

use crate::model::{FileId, WellAnnotation, WellGeometry, WellTable};
use crate::video::{ImageStack, WellImages};

use super::error::SessionError;

/// Wells of the one file currently open, in the video's well order.
///
/// Labels are edited here and reach the persisted table only through
/// [`WorkingSet::commit_into`].
#[derive(Debug, Clone)]
pub struct WorkingSet {
    file_id: FileId,
    wells: Vec<WellAnnotation>,
    images: Option<WellImages>,
}

fn names<'a>(rows: impl Iterator<Item = &'a WellAnnotation>) -> Vec<String> {
    rows.map(|r| r.well_name.clone()).collect()
}

impl WorkingSet {
    /// Unannotated wells straight from the video's geometry.
    pub fn fresh(file_id: FileId, geometry: &[WellGeometry]) -> Self {
        Self {
            file_id,
            wells: geometry
                .iter()
                .map(|g| WellAnnotation::unannotated(file_id, g))
                .collect(),
            images: None,
        }
    }

    /// Working set for `file_id`, resuming stored labels when the table
    /// already has rows for it.
    ///
    /// Stored rows must name the same wells in the same order as
    /// `geometry`; stored bounds win over freshly read ones.
    pub fn build(
        file_id: FileId,
        table: &WellTable,
        geometry: &[WellGeometry],
    ) -> Result<Self, SessionError> {
        let stored: Vec<WellAnnotation> = table.rows_for(file_id).cloned().collect();
        if stored.is_empty() {
            return Ok(Self::fresh(file_id, geometry));
        }

        let expected = names(stored.iter());
        let found: Vec<String> = geometry.iter().map(|g| g.well_name.clone()).collect();
        if expected != found {
            log::error!(
                "Stored wells of file_id {} do not match its video: {:?} vs {:?}",
                file_id,
                expected,
                found
            );
            return Err(SessionError::WellOrderMismatch {
                file_id,
                expected,
                found,
            });
        }

        Ok(Self {
            file_id,
            wells: stored,
            images: None,
        })
    }

    pub fn with_images(mut self, images: WellImages) -> Self {
        self.images = Some(images);
        self
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn wells(&self) -> &[WellAnnotation] {
        &self.wells
    }

    pub fn len(&self) -> usize {
        self.wells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }

    pub fn well(&self, index: usize) -> Option<&WellAnnotation> {
        self.wells.get(index)
    }

    pub(crate) fn well_mut(&mut self, index: usize) -> Option<&mut WellAnnotation> {
        self.wells.get_mut(index)
    }

    /// Image stack of a well, when images were loaded.
    pub fn stack(&self, well_name: &str) -> Option<&ImageStack> {
        self.images.as_ref().and_then(|i| i.stack(well_name))
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [WellAnnotation], Option<&WellImages>) {
        (&mut self.wells, self.images.as_ref())
    }

    /// First unannotated well strictly after `index`.
    pub fn next_unannotated_after(&self, index: usize) -> Option<usize> {
        self.wells
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, w)| !w.is_annotated())
            .map(|(i, _)| i)
    }

    pub fn first_unannotated(&self) -> Option<usize> {
        self.wells.iter().position(|w| !w.is_annotated())
    }

    pub fn annotated_count(&self) -> usize {
        self.wells.iter().filter(|w| w.is_annotated()).count()
    }

    /// Write labels back into the persisted table.
    ///
    /// Appends every well when the table has no rows for this file.
    /// Otherwise the stored rows must match the working set one to one and
    /// in order, and only their labels are overwritten. Returns whether the
    /// table changed.
    pub fn commit_into(&self, table: &mut WellTable) -> Result<bool, SessionError> {
        let expected = names(table.rows_for(self.file_id));
        if expected.is_empty() {
            table.extend(self.wells.iter().cloned());
            return Ok(!self.wells.is_empty());
        }

        let found = names(self.wells.iter());
        if expected != found {
            log::error!(
                "Refusing to store progress of file_id {}: stored {:?}, open {:?}",
                self.file_id,
                expected,
                found
            );
            return Err(SessionError::WellOrderMismatch {
                file_id: self.file_id,
                expected,
                found,
            });
        }

        let mut changed = false;
        for (row, well) in table.rows_for_mut(self.file_id).zip(&self.wells) {
            if row.well_label != well.well_label {
                row.well_label = well.well_label;
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(names: &[&str]) -> Vec<WellGeometry> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| WellGeometry::new(*n, 10 * i as i32, 10 * i as i32 + 10, 0, 10))
            .collect()
    }

    #[test]
    fn test_first_commit_appends_rows() {
        let mut table = WellTable::new();
        let ws = WorkingSet::fresh(2, &geometry(&["A", "B"]));
        assert!(ws.commit_into(&mut table).unwrap());
        assert_eq!(table.rows_for(2).count(), 2);
    }

    #[test]
    fn test_commit_is_idempotent() {
        let mut table = WellTable::new();
        let mut ws = WorkingSet::fresh(0, &geometry(&["A", "B", "C"]));
        ws.well_mut(1).unwrap().well_label = 4;

        ws.commit_into(&mut table).unwrap();
        let once = table.clone();
        assert!(!ws.commit_into(&mut table).unwrap());
        assert_eq!(table, once);
    }

    #[test]
    fn test_commit_overwrites_labels_only() {
        let mut table = WellTable::new();
        WorkingSet::fresh(0, &geometry(&["A", "B"]))
            .commit_into(&mut table)
            .unwrap();

        let mut moved = geometry(&["A", "B"]);
        moved[0].x_max = 99;
        let mut ws = WorkingSet::fresh(0, &moved);
        ws.well_mut(0).unwrap().well_label = 2;
        ws.commit_into(&mut table).unwrap();

        let row = table.rows_for(0).next().unwrap();
        assert_eq!(row.well_label, 2);
        assert_eq!(row.x_max, 10);
    }

    #[test]
    fn test_commit_detects_reordered_wells() {
        let mut table = WellTable::new();
        WorkingSet::fresh(4, &geometry(&["B", "A", "C"]))
            .commit_into(&mut table)
            .unwrap();

        let ws = WorkingSet::fresh(4, &geometry(&["A", "B", "C"]));
        let err = ws.commit_into(&mut table).unwrap_err();
        assert!(matches!(err, SessionError::WellOrderMismatch { file_id: 4, .. }));
    }

    #[test]
    fn test_build_resumes_stored_labels() {
        let mut table = WellTable::new();
        let mut ws = WorkingSet::fresh(1, &geometry(&["A", "B"]));
        ws.well_mut(1).unwrap().well_label = 3;
        ws.commit_into(&mut table).unwrap();

        let rebuilt = WorkingSet::build(1, &table, &geometry(&["A", "B"])).unwrap();
        assert_eq!(rebuilt.well(1).unwrap().well_label, 3);
        assert_eq!(rebuilt.first_unannotated(), Some(0));
        assert_eq!(rebuilt.next_unannotated_after(0), None);

        assert!(WorkingSet::build(1, &table, &geometry(&["B", "A"])).is_err());
    }
}
