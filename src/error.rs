//! Error taxonomy for the analysis core.

use thiserror::Error;

use crate::extract::ExtractionError;
use crate::llm::InferenceError;
use crate::repository::RepositoryError;

/// Errors surfaced by the analysis core and its collaborators.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document or analysis absent, or not owned by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Storage read/write failure.
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    /// A second analyze request arrived while a run is active.
    #[error("analysis already in progress for document {0}")]
    ConcurrentRun(String),

    /// Note operation with an out-of-range clause/note index.
    #[error("{0}")]
    InvalidIndex(String),
}

impl CoreError {
    /// Whether a failed pipeline run may be retried automatically.
    ///
    /// Quota and credential failures will not resolve on their own, and a
    /// vanished document has nothing left to retry against.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Inference(e) => e.is_retryable(),
            CoreError::NotFound(_) | CoreError::ConcurrentRun(_) | CoreError::InvalidIndex(_) => {
                false
            }
            CoreError::Extraction(_) | CoreError::Persistence(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_are_not_retryable() {
        let err = CoreError::Inference(InferenceError::QuotaExceeded("out of tokens".into()));
        assert!(!err.is_retryable());

        let err = CoreError::Inference(InferenceError::InvalidCredentials("bad key".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        let err = CoreError::Inference(InferenceError::Timeout(120));
        assert!(err.is_retryable());

        let err = CoreError::Extraction(ExtractionError::Unreadable { chars: 3 });
        assert!(err.is_retryable());
    }
}
