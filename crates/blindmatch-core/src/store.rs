//! Storage seams: encrypted records and the durable protocol ledger

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::pending::PendingEntry;
use crate::records::{
    EncryptedPaper, EncryptedReviewer, MatchResult, PaperCiphertexts, ReviewerCiphertexts,
};
use crate::types::{PaperId, RequestId, ReviewerId};

/// Append-only storage for encrypted records
///
/// Identifiers are assigned by the store: the first paper is 1, the next
/// is 2, and so on. Reviewers count independently. Records are never
/// modified once stored, and ciphertext content is never inspected.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a paper under the next paper id
    async fn submit_paper(
        &self,
        ciphertexts: PaperCiphertexts,
        submitted_at: u64,
    ) -> CoreResult<EncryptedPaper>;

    /// Store a reviewer under the next reviewer id
    async fn add_reviewer(
        &self,
        ciphertexts: ReviewerCiphertexts,
        added_at: u64,
    ) -> CoreResult<EncryptedReviewer>;

    /// Look up a paper
    async fn paper(&self, id: PaperId) -> CoreResult<Option<EncryptedPaper>>;

    /// Look up a reviewer
    async fn reviewer(&self, id: ReviewerId) -> CoreResult<Option<EncryptedReviewer>>;

    /// The full reviewer registry, ascending by id
    async fn reviewers(&self) -> CoreResult<Vec<EncryptedReviewer>>;

    /// Number of papers submitted so far
    async fn paper_count(&self) -> CoreResult<u64>;

    /// Number of reviewers added so far
    async fn reviewer_count(&self) -> CoreResult<u64>;
}

/// Everything a [`LedgerStore`] holds, as loaded at startup
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub matches: Vec<MatchResult>,
    pub pending: Vec<(RequestId, PendingEntry)>,
    pub retired: Vec<RequestId>,
}

/// Durable copy of match results and request bookkeeping
///
/// Without one, the service keeps this state in memory only and a restart
/// forgets reveals and the replay guard. Each write is applied before the
/// in-memory ledger changes, so a failed write leaves both untouched.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(&self) -> CoreResult<LedgerSnapshot>;

    async fn record_pending(&self, request_id: RequestId, entry: PendingEntry) -> CoreResult<()>;

    /// Retire a request and, in the same transaction, store the match it produced
    async fn retire(
        &self,
        request_id: RequestId,
        result: Option<&MatchResult>,
    ) -> CoreResult<()>;

    async fn save_match(&self, result: &MatchResult) -> CoreResult<()>;
}
