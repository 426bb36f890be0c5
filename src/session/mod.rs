//! Annotation session: which file and well to show, and keeping the store
//! consistent while the user or the classifier moves through it.

mod error;
mod intent;
mod navigator;
mod resolve;
mod working_set;

#[cfg(test)]
mod tests;

pub use error::SessionError;
pub use intent::Intent;
pub use navigator::{
    Dispatched, Focus, Movement, Navigator, NavigatorState, Progress, rescan_contents,
};
pub use resolve::{Resolution, resolve_next};
pub use working_set::WorkingSet;
