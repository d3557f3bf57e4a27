//! Matching evaluators
//!
//! The ranking over encrypted reviewer profiles is a strategy behind
//! [`MatchEvaluator`]. The only strategy shipped here is
//! [`LowestIdEvaluator`], a placeholder that treats every reviewer as an
//! equally good fit.

use crate::error::{CoreError, CoreResult};
use crate::records::{EncryptedReviewer, PaperDescriptors};
use crate::types::{CiphertextHandle, ReviewerId};

const SCORE_CONTEXT: &str = "blindmatch 2024 match score handle";

/// The outcome of one evaluation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub reviewer_id: ReviewerId,
    /// Handle of the encrypted score for this pairing
    pub score: CiphertextHandle,
}

/// Picks the best reviewer for a paper
///
/// Implementations must be deterministic, must return exactly one reviewer
/// for a non-empty registry with ties going to the lowest id, and must fail
/// with [`CoreError::NoReviewersAvailable`] for an empty one.
pub trait MatchEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        paper: &PaperDescriptors,
        reviewers: &[EncryptedReviewer],
    ) -> CoreResult<Selection>;
}

/// Highest score wins, ties go to the lowest reviewer id
pub fn select_best<'a, S: Ord>(
    scored: impl IntoIterator<Item = (&'a EncryptedReviewer, S)>,
) -> CoreResult<&'a EncryptedReviewer> {
    scored
        .into_iter()
        .max_by(|(ra, sa), (rb, sb)| sa.cmp(sb).then_with(|| rb.id.cmp(&ra.id)))
        .map(|(reviewer, _)| reviewer)
        .ok_or(CoreError::NoReviewersAvailable)
}

/// Handle naming the encrypted score of a paper/reviewer pairing
pub fn score_handle(paper: &PaperDescriptors, reviewer: &EncryptedReviewer) -> CiphertextHandle {
    CiphertextHandle::derive(
        SCORE_CONTEXT,
        &[
            paper.digest().as_bytes().as_slice(),
            reviewer.ciphertexts.expertise.as_bytes().as_slice(),
        ],
    )
}

/// Placeholder strategy: every reviewer scores the same
pub struct LowestIdEvaluator;

impl MatchEvaluator for LowestIdEvaluator {
    fn name(&self) -> &'static str {
        "lowest-id (placeholder)"
    }

    fn evaluate(
        &self,
        paper: &PaperDescriptors,
        reviewers: &[EncryptedReviewer],
    ) -> CoreResult<Selection> {
        let best = select_best(reviewers.iter().map(|r| (r, ())))?;
        Ok(Selection {
            reviewer_id: best.id,
            score: score_handle(paper, best),
        })
    }
}
