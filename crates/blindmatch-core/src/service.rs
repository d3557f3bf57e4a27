//! The coordinating service
//!
//! `MatchingService` owns the request ledger and the match table and is
//! the only thing that mutates them. Operations that move the protocol
//! forward are serialized on one async lock, held from start to finish
//! with the oracle round-trip included, so a callback can never find its
//! request before the pending entry for it has been written. The ledger
//! itself sits behind a separate short-lived lock, so reads and record
//! submissions never wait on the oracle.
//!
//! Per-paper lifecycle:
//!
//! ```text
//! Submitted -> MatchRequested -> MatchComputed -> [Acknowledged]
//!           -> RevealRequested -> Revealed
//! ```
//!
//! The matched reviewer is disclosed only by `MatchRevealed`. Nothing
//! published before that, events and logs included, names the reviewer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::evaluator::MatchEvaluator;
use crate::events::{EventLog, EventRecord, MatchEvent};
use crate::oracle::{Callback, DecryptedValues, DecryptionOracle};
use crate::pending::{PendingEntry, PendingRequest, RequestLedger};
use crate::records::{
    EncryptedPaper, EncryptedReviewer, MatchResult, PaperCiphertexts, PaperDescriptors,
    ReviewerCiphertexts,
};
use crate::store::{LedgerStore, RecordStore};
use crate::types::{CiphertextHandle, PaperId, RequestId, ReviewerId, unix_now};
use crate::verify::ProofVerifier;

const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Knobs for the parts of the protocol that are deployment decisions
#[derive(Clone, Debug)]
pub struct ServicePolicy {
    /// Refuse to reveal until the matched reviewer has acknowledged
    pub require_reviewer_consent: bool,
    /// Pending requests older than this are expired by
    /// [`MatchingService::expire_pending`]. `None` keeps them forever.
    pub request_ttl_secs: Option<u64>,
    /// Give up on an oracle submission after this long. `None` waits forever.
    pub oracle_timeout: Option<Duration>,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self {
            require_reviewer_consent: false,
            request_ttl_secs: None,
            oracle_timeout: Some(DEFAULT_ORACLE_TIMEOUT),
        }
    }
}

/// Where a paper is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperState {
    Submitted,
    MatchRequested,
    MatchComputed,
    Acknowledged,
    RevealRequested,
    Revealed,
}

#[derive(Default)]
struct Ledger {
    requests: RequestLedger,
    matches: HashMap<PaperId, MatchResult>,
}

pub struct MatchingService {
    records: Arc<dyn RecordStore>,
    oracle: Arc<dyn DecryptionOracle>,
    verifier: Arc<dyn ProofVerifier>,
    evaluator: Arc<dyn MatchEvaluator>,
    persistence: Option<Arc<dyn LedgerStore>>,
    policy: ServicePolicy,
    operations: tokio::sync::Mutex<()>,
    /// Never held across an await
    ledger: Mutex<Ledger>,
    events: EventLog,
}

impl MatchingService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        oracle: Arc<dyn DecryptionOracle>,
        verifier: Arc<dyn ProofVerifier>,
        evaluator: Arc<dyn MatchEvaluator>,
    ) -> Self {
        tracing::info!(
            oracle = oracle.name(),
            evaluator = evaluator.name(),
            "matching service ready"
        );
        Self {
            records,
            oracle,
            verifier,
            evaluator,
            persistence: None,
            policy: ServicePolicy::default(),
            operations: tokio::sync::Mutex::new(()),
            ledger: Mutex::new(Ledger::default()),
            events: EventLog::new(),
        }
    }

    pub fn with_policy(mut self, policy: ServicePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Persist the ledger through `store`, restoring whatever it already holds
    pub async fn with_ledger_store(mut self, store: Arc<dyn LedgerStore>) -> CoreResult<Self> {
        let snapshot = store.load().await?;
        let (matches, pending, retired) = (
            snapshot.matches.len(),
            snapshot.pending.len(),
            snapshot.retired.len(),
        );

        let ledger = self
            .ledger
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for request_id in snapshot.retired {
            ledger.requests.restore_retired(request_id);
        }
        for (request_id, entry) in snapshot.pending {
            ledger.requests.restore_pending(request_id, entry);
        }
        for result in snapshot.matches {
            ledger.matches.insert(result.paper_id, result);
        }

        tracing::info!(matches, pending, retired, "ledger restored");
        self.persistence = Some(store);
        Ok(self)
    }

    pub fn policy(&self) -> &ServicePolicy {
        &self.policy
    }

    // === Record store ===

    /// Store an encrypted paper under the next paper id
    pub async fn submit_paper(&self, ciphertexts: PaperCiphertexts) -> CoreResult<EncryptedPaper> {
        let now = unix_now();

        let paper = self.records.submit_paper(ciphertexts, now).await?;
        tracing::info!(paper_id = %paper.id, "paper submitted");
        self.events.emit(
            MatchEvent::PaperSubmitted {
                paper_id: paper.id,
                timestamp: paper.submitted_at,
            },
            now,
        );
        Ok(paper)
    }

    /// Register an encrypted reviewer under the next reviewer id
    pub async fn add_reviewer(
        &self,
        ciphertexts: ReviewerCiphertexts,
    ) -> CoreResult<EncryptedReviewer> {
        let now = unix_now();

        let reviewer = self.records.add_reviewer(ciphertexts, now).await?;
        tracing::info!(reviewer_id = %reviewer.id, "reviewer added");
        self.events.emit(
            MatchEvent::ReviewerAdded {
                reviewer_id: reviewer.id,
            },
            now,
        );
        Ok(reviewer)
    }

    // === Matching ===

    /// Ask the oracle to decrypt a paper's descriptors for matching
    ///
    /// Returns as soon as the oracle has accepted the request; the match
    /// itself is computed in [`process_matching`](Self::process_matching).
    pub async fn request_matching(&self, paper_id: PaperId) -> CoreResult<RequestId> {
        let _op = self.operations.lock().await;

        let paper = self
            .records
            .paper(paper_id)
            .await?
            .ok_or(CoreError::InvalidPaperId(paper_id))?;

        {
            let ledger = self.ledger();
            if ledger.matches.get(&paper_id).is_some_and(|m| m.revealed) {
                return Err(CoreError::AlreadyRevealed(paper_id));
            }
            if ledger.requests.has_reveal_for(paper_id) {
                return Err(CoreError::RequestInFlight(paper_id));
            }
        }

        let request_id = self
            .submit(&paper.ciphertexts.handles(), Callback::ProcessMatching)
            .await?;
        let now = unix_now();
        self.park(request_id, PendingRequest::Matching(paper_id), now).await?;

        tracing::info!(%paper_id, %request_id, "matching requested");
        self.events.emit(MatchEvent::MatchingRequested { paper_id, request_id }, now);
        Ok(request_id)
    }

    /// Oracle callback carrying a paper's decrypted descriptors
    pub async fn process_matching(
        &self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> CoreResult<MatchResult> {
        let _op = self.operations.lock().await;

        let paper_id = self
            .ledger()
            .requests
            .expect(request_id, Callback::ProcessMatching)?;
        self.verify_or_retire(request_id, cleartext, proof).await?;

        let descriptors = PaperDescriptors::decode(cleartext)?;
        let reviewers = self.records.reviewers().await?;
        let selection = self.evaluator.evaluate(&descriptors, &reviewers)?;

        let now = unix_now();
        let result = MatchResult::new(paper_id, selection.reviewer_id, selection.score, now);
        if let Some(store) = &self.persistence {
            store.retire(request_id, Some(&result)).await?;
        }
        {
            let mut ledger = self.ledger();
            ledger.requests.retire(request_id);
            ledger.matches.insert(paper_id, result.clone());
        }

        tracing::info!(%paper_id, %request_id, "match computed");
        self.events.emit(MatchEvent::MatchComputed { paper_id }, now);
        Ok(result)
    }

    // === Reveal ===

    /// Record the matched reviewer's consent to disclosure
    pub async fn acknowledge_match(
        &self,
        paper_id: PaperId,
        reviewer_id: ReviewerId,
    ) -> CoreResult<()> {
        let _op = self.operations.lock().await;

        let mut result = {
            let ledger = self.ledger();
            let result = ledger
                .matches
                .get(&paper_id)
                .ok_or(CoreError::NoMatchFound(paper_id))?;

            if result.revealed {
                return Err(CoreError::AlreadyRevealed(paper_id));
            }
            if result.reviewer_id != reviewer_id {
                return Err(CoreError::ReviewerMismatch {
                    paper_id,
                    reviewer_id,
                });
            }
            if result.acknowledged {
                return Ok(());
            }
            result.clone()
        };

        result.acknowledged = true;
        if let Some(store) = &self.persistence {
            store.save_match(&result).await?;
        }
        self.ledger().matches.insert(paper_id, result);

        tracing::info!(%paper_id, "match acknowledged");
        self.events.emit(MatchEvent::MatchAcknowledged { paper_id }, unix_now());
        Ok(())
    }

    /// Ask the oracle to decrypt the match score so the match can be disclosed
    pub async fn reveal_matched_reviewer(&self, paper_id: PaperId) -> CoreResult<RequestId> {
        let _op = self.operations.lock().await;

        let score: CiphertextHandle = {
            let ledger = self.ledger();
            let result = ledger
                .matches
                .get(&paper_id)
                .ok_or(CoreError::NoMatchFound(paper_id))?;
            if result.revealed {
                return Err(CoreError::AlreadyRevealed(paper_id));
            }
            if ledger.requests.has_pending_for(paper_id) {
                return Err(CoreError::RequestInFlight(paper_id));
            }
            if self.policy.require_reviewer_consent && !result.acknowledged {
                return Err(CoreError::ConsentRequired(paper_id));
            }
            result.score
        };

        let request_id = self.submit(&[score], Callback::FinalizeReveal).await?;
        let now = unix_now();
        self.park(request_id, PendingRequest::Reveal(paper_id), now).await?;

        tracing::info!(%paper_id, %request_id, "reveal requested");
        self.events.emit(MatchEvent::RevealRequested { paper_id, request_id }, now);
        Ok(request_id)
    }

    /// Oracle callback carrying the decrypted match score
    pub async fn finalize_reveal(
        &self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> CoreResult<MatchResult> {
        let _op = self.operations.lock().await;

        let paper_id = self
            .ledger()
            .requests
            .expect(request_id, Callback::FinalizeReveal)?;
        self.verify_or_retire(request_id, cleartext, proof).await?;

        let score = DecryptedValues::decode_single(cleartext)?;
        let mut result = self
            .ledger()
            .matches
            .get(&paper_id)
            .cloned()
            .ok_or(CoreError::NoMatchFound(paper_id))?;

        let now = unix_now();
        result.revealed = true;
        result.revealed_at = Some(now);
        result.disclosed_score = Some(score);

        if let Some(store) = &self.persistence {
            store.retire(request_id, Some(&result)).await?;
        }
        {
            let mut ledger = self.ledger();
            ledger.requests.retire(request_id);
            ledger.matches.insert(paper_id, result.clone());
        }

        tracing::info!(
            %paper_id,
            %request_id,
            reviewer_id = %result.reviewer_id,
            "match revealed"
        );
        self.events.emit(
            MatchEvent::MatchRevealed {
                paper_id,
                reviewer_id: result.reviewer_id,
            },
            now,
        );
        Ok(result)
    }

    // === Request lifecycle ===

    /// Withdraw a pending request; a late callback for it is rejected
    pub async fn cancel_request(&self, request_id: RequestId) -> CoreResult<PendingEntry> {
        let _op = self.operations.lock().await;

        let entry = self
            .ledger()
            .requests
            .get(request_id)
            .copied()
            .ok_or(CoreError::InvalidRequest(request_id))?;
        if let Some(store) = &self.persistence {
            store.retire(request_id, None).await?;
        }
        self.ledger().requests.retire(request_id);

        tracing::info!(%request_id, paper_id = %entry.request.paper_id(), "request cancelled");
        self.events.emit(MatchEvent::RequestCancelled { request_id }, unix_now());
        Ok(entry)
    }

    /// Retire every pending request older than the configured TTL
    pub async fn expire_pending(&self, now: u64) -> Vec<RequestId> {
        let Some(ttl) = self.policy.request_ttl_secs else {
            return Vec::new();
        };

        let _op = self.operations.lock().await;
        let stale = self.ledger().requests.expired(now, ttl);

        let mut expired = Vec::with_capacity(stale.len());
        for request_id in stale {
            if let Some(store) = &self.persistence {
                if let Err(e) = store.retire(request_id, None).await {
                    tracing::error!(%request_id, error = %e, "failed to persist expiry");
                    continue;
                }
            }
            let Some(entry) = self.ledger().requests.retire(request_id) else {
                continue;
            };

            tracing::warn!(
                %request_id,
                paper_id = %entry.request.paper_id(),
                issued_at = entry.issued_at,
                "oracle request expired unanswered"
            );
            self.events.emit(MatchEvent::RequestExpired { request_id }, now);
            expired.push(request_id);
        }
        expired
    }

    // === Read accessors ===

    pub async fn paper(&self, paper_id: PaperId) -> CoreResult<Option<EncryptedPaper>> {
        self.records.paper(paper_id).await
    }

    pub async fn reviewer(&self, reviewer_id: ReviewerId) -> CoreResult<Option<EncryptedReviewer>> {
        self.records.reviewer(reviewer_id).await
    }

    pub async fn paper_count(&self) -> CoreResult<u64> {
        self.records.paper_count().await
    }

    pub async fn reviewer_count(&self) -> CoreResult<u64> {
        self.records.reviewer_count().await
    }

    /// The full match record, reviewer included
    ///
    /// Publish [`MatchResult::view`] instead of this.
    pub async fn match_result(&self, paper_id: PaperId) -> Option<MatchResult> {
        self.ledger().matches.get(&paper_id).cloned()
    }

    pub async fn pending_request(&self, request_id: RequestId) -> Option<PendingEntry> {
        self.ledger().requests.get(request_id).copied()
    }

    pub async fn pending_count(&self) -> usize {
        self.ledger().requests.len()
    }

    /// Highest request id the ledger has seen, pending or retired
    pub fn last_request_id(&self) -> Option<RequestId> {
        self.ledger().requests.highest_id()
    }

    /// Lifecycle state of a paper, `None` if it was never submitted
    pub async fn paper_state(&self, paper_id: PaperId) -> CoreResult<Option<PaperState>> {
        if self.records.paper(paper_id).await?.is_none() {
            return Ok(None);
        }

        let ledger = self.ledger();
        let state = if ledger.requests.has_reveal_for(paper_id) {
            PaperState::RevealRequested
        } else if ledger.requests.has_pending_for(paper_id) {
            PaperState::MatchRequested
        } else {
            match ledger.matches.get(&paper_id) {
                Some(m) if m.revealed => PaperState::Revealed,
                Some(m) if m.acknowledged => PaperState::Acknowledged,
                Some(_) => PaperState::MatchComputed,
                None => PaperState::Submitted,
            }
        };
        Ok(Some(state))
    }

    pub fn events_since(&self, after: u64) -> Vec<EventRecord> {
        self.events.since(after)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand handles to the oracle, bounded by the policy timeout
    async fn submit(
        &self,
        handles: &[CiphertextHandle],
        callback: Callback,
    ) -> CoreResult<RequestId> {
        let request = self.oracle.request(handles, callback);
        let Some(limit) = self.policy.oracle_timeout else {
            return request.await;
        };

        tokio::time::timeout(limit, request).await.map_err(|_| {
            tracing::warn!(
                oracle = self.oracle.name(),
                callback = callback.as_str(),
                ?limit,
                "oracle did not accept request in time"
            );
            CoreError::Oracle(format!("oracle did not answer within {limit:?}"))
        })?
    }

    /// Record a request the oracle has accepted
    async fn park(
        &self,
        request_id: RequestId,
        request: PendingRequest,
        issued_at: u64,
    ) -> CoreResult<()> {
        self.ledger().requests.ensure_fresh(request_id)?;
        if let Some(store) = &self.persistence {
            store
                .record_pending(request_id, PendingEntry { request, issued_at })
                .await?;
        }
        self.ledger().requests.insert(request_id, request, issued_at)
    }

    /// Check an oracle proof, retiring the request if it does not hold
    ///
    /// The oracle has already spent the request, so a rejected answer
    /// cannot be retried under the same id.
    async fn verify_or_retire(
        &self,
        request_id: RequestId,
        cleartext: &[u8],
        proof: &[u8],
    ) -> CoreResult<()> {
        let Err(err) = self.verifier.verify(request_id, cleartext, proof) else {
            return Ok(());
        };

        if let Some(store) = &self.persistence {
            if let Err(e) = store.retire(request_id, None).await {
                tracing::error!(%request_id, error = %e, "failed to persist retired request");
            }
        }
        self.ledger().requests.retire(request_id);
        tracing::warn!(%request_id, error = %err, "oracle proof rejected, request retired");
        self.events.emit(MatchEvent::ProofRejected { request_id }, unix_now());

        Err(match err {
            CoreError::ProofRejected { .. } => err,
            other => CoreError::ProofRejected {
                request_id,
                reason: other.to_string(),
            },
        })
    }
}
