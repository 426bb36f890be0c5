//! Global constants for the well annotator

/// Suffix identifying an annotation store file.
pub const STORE_SUFFIX: &str = "_wells_annotations.json";

/// Extension of candidate video files.
pub const VIDEO_EXTENSION: &str = "hdf5";

/// Directory names that mark a Tierpsy video root.
pub const SCAN_ROOT_DIRS: &[&str] = &["MaskedVideos", "Results"];

/// Directory that holds stores next to a Tierpsy video root.
pub const AUXILIARY_DIR: &str = "AuxiliaryFiles";

/// Suffix of feature files under a `Results` root.
pub const FEATURES_SUFFIX: &str = "_featuresN.hdf5";

/// Substring marking pre-stimulus recordings.
pub const PRESTIM_MARKER: &str = "prestim";

/// Default number of frames sampled from each video.
pub const DEFAULT_FRAMES_TO_READ: usize = 5;
