use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a batch before any job is dispatched.
///
/// Per-video problems are not represented here; they travel as
/// [`crate::report::JobFailure`] inside each outcome.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot list source directory {path}: {source}")]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
