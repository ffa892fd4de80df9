//! Error taxonomy for dictionary mutation and profile loading.
//!
//! Mutator errors (`UnknownBucket`, `UnknownIntent`, `InvalidBucketPath`,
//! `InvalidSuggestion`) are always raised before the first write, so a
//! failed call leaves the dictionary exactly as it was. Load-time errors
//! (`ProfileNotFound`, `DictionaryMissing`) and save-time
//! `PersistenceFailure` come from the service layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DictionaryError>;

#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("unknown bucket: '{0}'")]
    UnknownBucket(String),

    #[error("unknown intent: '{0}'. Must be TRANSACTIONAL, COMMERCIAL_RESEARCH, INFORMATIONAL, or DIRECTORY")]
    UnknownIntent(String),

    #[error("invalid bucket path: '{0}'")]
    InvalidBucketPath(String),

    #[error("invalid suggestion set: {0}")]
    InvalidSuggestion(String),

    #[error("profile not found for client '{0}'")]
    ProfileNotFound(String),

    #[error("profile for client '{0}' has no matching dictionary")]
    DictionaryMissing(String),

    #[error("persistence failure: {0:#}")]
    PersistenceFailure(#[source] anyhow::Error),
}

impl DictionaryError {
    /// True for errors raised by the mutators themselves (bad input), as
    /// opposed to load/save failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DictionaryError::UnknownBucket(_)
                | DictionaryError::UnknownIntent(_)
                | DictionaryError::InvalidBucketPath(_)
                | DictionaryError::InvalidSuggestion(_)
        )
    }
}
