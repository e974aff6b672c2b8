//! Engine-level error taxonomy.
//!
//! Absence of data (vanished article, empty interaction history, zero-norm
//! vectors) is never an error: those paths degrade to skips or empty
//! results. Errors are reserved for broken computation — persistence
//! failures and requests made before any vocabulary exists.

use crate::store::RepoError;
use crate::vectorizer::VectorizerError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Search/recommendation was requested but no vectorizer model has
    /// been fit or loaded yet, so no meaningful scores can exist.
    #[error("no vectorizer model available; fit or load one first")]
    MissingVocabulary,

    #[error("vector repo failed: {0}")]
    Repo(#[from] RepoError),

    #[error("vectorizer model error: {0}")]
    Model(#[from] VectorizerError),

    #[error("internal error: {0}")]
    Internal(String),
}
