//! Protocol error types

use thiserror::Error;

use crate::types::{PaperId, RequestId, ReviewerId};

pub type CoreResult<T> = Result<T, CoreError>;

/// Every variant aborts the enclosing operation. The only write that
/// survives a failure is the retirement of a request whose proof was
/// rejected.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid paper id: {0}")]
    InvalidPaperId(PaperId),

    #[error("No reviewers available for matching")]
    NoReviewersAvailable,

    #[error("Invalid request: {0}")]
    InvalidRequest(RequestId),

    #[error("No match found for paper {0}")]
    NoMatchFound(PaperId),

    #[error("Match for paper {0} already revealed")]
    AlreadyRevealed(PaperId),

    #[error("Oracle proof rejected for request {request_id}: {reason}")]
    ProofRejected {
        request_id: RequestId,
        reason: String,
    },

    #[error("An oracle request for paper {0} is still pending")]
    RequestInFlight(PaperId),

    #[error("Reviewer has not acknowledged the match for paper {0}")]
    ConsentRequired(PaperId),

    #[error("Reviewer {reviewer_id} is not the match for paper {paper_id}")]
    ReviewerMismatch {
        paper_id: PaperId,
        reviewer_id: ReviewerId,
    },

    #[error("Oracle reissued request id {0}")]
    DuplicateRequest(RequestId),

    #[error("Malformed cleartext: {0}")]
    MalformedCleartext(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}
