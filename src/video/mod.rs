//! Video access for the working set.
//!
//! Decoding is delegated to a [`VideoBackend`]; this module only decides
//! which frames to sample, stacks them and cuts the stack into wells.
//!
//! ## Implementing a backend
//!
//! ```rust,ignore
//! use well_annotator::video::{Frame, VideoBackend, VideoError};
//!
//! struct MaskedVideoReader;
//!
//! impl VideoBackend for MaskedVideoReader {
//!     type Handle = MyHdf5File;
//!     fn open(&mut self, path: &Path) -> Result<Self::Handle, VideoError> { /* ... */ }
//!     fn frame_count(&self, handle: &Self::Handle) -> usize { /* ... */ }
//!     fn read_frame(&mut self, handle: &mut Self::Handle, index: usize) -> Result<Frame, VideoError> { /* ... */ }
//!     fn well_geometry(&mut self, handle: &Self::Handle) -> Result<Vec<WellGeometry>, VideoError> { /* ... */ }
//!     fn close(&mut self, handle: Self::Handle) {}
//! }
//! ```

mod error;
mod tiling;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::model::WellGeometry;

pub use error::VideoError;
pub use tiling::split_into_wells;

/// One grayscale frame (height x width).
pub type Frame = Array2<u8>;

/// A stack of frames (frames x height x width).
pub type ImageStack = Array3<u8>;

/// Decoder for multi-well plate videos.
pub trait VideoBackend {
    /// Open video, released by [`VideoBackend::close`].
    type Handle;

    fn open(&mut self, path: &Path) -> Result<Self::Handle, VideoError>;

    fn frame_count(&self, handle: &Self::Handle) -> usize;

    fn read_frame(&mut self, handle: &mut Self::Handle, index: usize) -> Result<Frame, VideoError>;

    /// Well bounds of the video, in a stable order.
    ///
    /// The order must be the same every time the same file is read; stored
    /// progress is matched against it row by row.
    fn well_geometry(&mut self, handle: &Self::Handle) -> Result<Vec<WellGeometry>, VideoError>;

    fn close(&mut self, handle: Self::Handle);
}

/// Indices of the frames sampled from a video of `n_frames`.
///
/// Every frame when `target >= n_frames`, otherwise every
/// `ceil(n_frames / target)`-th frame from 0.
pub fn frame_indices(n_frames: usize, target: usize) -> Vec<usize> {
    let target = target.max(1);
    let skip = if target >= n_frames {
        1
    } else {
        n_frames.div_ceil(target)
    };
    (0..n_frames).step_by(skip).collect()
}

/// Wells of one video, with their sampled frames.
#[derive(Debug, Clone)]
pub struct WellImages {
    /// Geometry in the backend's order.
    pub geometry: Vec<WellGeometry>,
    /// Cropped stack per well name.
    pub stacks: HashMap<String, ImageStack>,
}

impl WellImages {
    pub fn stack(&self, well_name: &str) -> Option<&ImageStack> {
        self.stacks.get(well_name)
    }
}

/// Read the sampled frames of `path` and cut them into wells.
///
/// Frames that fail to decode are skipped with a warning.
pub fn load_well_images<V: VideoBackend>(
    backend: &mut V,
    path: &Path,
    frames_to_read: usize,
) -> Result<WellImages, VideoError> {
    let mut handle = backend.open(path)?;
    let result = read_well_images(backend, &mut handle, path, frames_to_read);
    backend.close(handle);
    result
}

fn read_well_images<V: VideoBackend>(
    backend: &mut V,
    handle: &mut V::Handle,
    path: &Path,
    frames_to_read: usize,
) -> Result<WellImages, VideoError> {
    let n_frames = backend.frame_count(handle);
    let mut frames = Vec::new();
    for index in frame_indices(n_frames, frames_to_read) {
        match backend.read_frame(handle, index) {
            Ok(frame) => frames.push(frame),
            Err(e) => log::warn!("Skipping frame: {}", e),
        }
    }
    if frames.is_empty() {
        return Err(VideoError::NoFrames {
            path: path.to_path_buf(),
        });
    }

    let views: Vec<ArrayView2<'_, u8>> = frames.iter().map(|f| f.view()).collect();
    let stack = ndarray::stack(Axis(0), &views).map_err(|e| VideoError::Read {
        path: path.to_path_buf(),
        frame: 0,
        message: format!("frames differ in size: {}", e),
    })?;

    let geometry = backend.well_geometry(handle)?;
    if geometry.is_empty() {
        return Err(VideoError::MissingWellDefinition {
            path: path.to_path_buf(),
        });
    }
    let mut names = HashSet::new();
    if let Some(dup) = geometry.iter().find(|g| !names.insert(g.well_name.as_str())) {
        return Err(VideoError::InvalidGeometry {
            well: dup.well_name.clone(),
            reason: format!("well name defined more than once in {:?}", path),
        });
    }
    let stacks = split_into_wells(&stack, &geometry)?;

    log::debug!(
        "Loaded {:?}: {} of {} frames, {} wells",
        path,
        frames.len(),
        n_frames,
        geometry.len()
    );
    Ok(WellImages { geometry, stacks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_indices() {
        assert_eq!(frame_indices(3, 5), vec![0, 1, 2]);
        assert_eq!(frame_indices(5, 5), vec![0, 1, 2, 3, 4]);
        assert_eq!(frame_indices(10, 5), vec![0, 2, 4, 6, 8]);
        assert_eq!(frame_indices(11, 5), vec![0, 3, 6, 9]);
        assert_eq!(frame_indices(4, 0), vec![0]);
        assert!(frame_indices(0, 5).is_empty());
    }
}
