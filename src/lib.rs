//! Well annotator
//!
//! Resumable quality annotation of the wells of multi-well plate videos.
//! A store file keeps the registry of videos and one label per well, and a
//! [`session::Navigator`] walks the annotator (or a bulk classifier) through
//! the files that still need attention.

pub mod config;
mod constants;
pub mod discovery;
pub mod labeling;
pub mod model;
pub mod session;
pub mod store;
pub mod video;
