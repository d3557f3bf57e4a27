//! Pending oracle requests
//!
//! Every request the service sends to the oracle is parked here as a
//! continuation until its callback arrives. One table holds both kinds so
//! the request id namespace is shared. Ids that have left the table are
//! remembered so a replayed callback can never be accepted twice.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::oracle::Callback;
use crate::types::{PaperId, RequestId};

/// What a pending request will resume when answered
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "paper_id", rename_all = "snake_case")]
pub enum PendingRequest {
    Matching(PaperId),
    Reveal(PaperId),
}

impl PendingRequest {
    pub fn paper_id(&self) -> PaperId {
        match self {
            PendingRequest::Matching(id) | PendingRequest::Reveal(id) => *id,
        }
    }

    /// The callback that is allowed to consume this entry
    pub fn callback(&self) -> Callback {
        match self {
            PendingRequest::Matching(_) => Callback::ProcessMatching,
            PendingRequest::Reveal(_) => Callback::FinalizeReveal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    pub request: PendingRequest,
    /// Unix seconds
    pub issued_at: u64,
}

#[derive(Default)]
pub struct RequestLedger {
    pending: HashMap<RequestId, PendingEntry>,
    retired: HashSet<RequestId>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if `request_id` has been seen before
    pub fn ensure_fresh(&self, request_id: RequestId) -> CoreResult<()> {
        if self.pending.contains_key(&request_id) || self.retired.contains(&request_id) {
            return Err(CoreError::DuplicateRequest(request_id));
        }
        Ok(())
    }

    /// Park a freshly issued request
    pub fn insert(
        &mut self,
        request_id: RequestId,
        request: PendingRequest,
        issued_at: u64,
    ) -> CoreResult<()> {
        self.ensure_fresh(request_id)?;
        self.pending
            .insert(request_id, PendingEntry { request, issued_at });
        Ok(())
    }

    /// Reload a pending entry from durable storage
    pub fn restore_pending(&mut self, request_id: RequestId, entry: PendingEntry) {
        self.pending.insert(request_id, entry);
    }

    /// Reload a retired id from durable storage
    pub fn restore_retired(&mut self, request_id: RequestId) {
        self.pending.remove(&request_id);
        self.retired.insert(request_id);
    }

    /// The largest id ever parked here
    pub fn highest_id(&self) -> Option<RequestId> {
        self.pending.keys().chain(self.retired.iter()).max().copied()
    }

    pub fn get(&self, request_id: RequestId) -> Option<&PendingEntry> {
        self.pending.get(&request_id)
    }

    /// Look up the paper a callback resumes, without consuming it
    ///
    /// Unknown, retired and wrongly tagged ids all fail the same way.
    pub fn expect(&self, request_id: RequestId, callback: Callback) -> CoreResult<PaperId> {
        match self.pending.get(&request_id) {
            Some(entry) if entry.request.callback() == callback => Ok(entry.request.paper_id()),
            _ => Err(CoreError::InvalidRequest(request_id)),
        }
    }

    /// Remove an entry for good
    pub fn retire(&mut self, request_id: RequestId) -> Option<PendingEntry> {
        let entry = self.pending.remove(&request_id)?;
        self.retired.insert(request_id);
        Some(entry)
    }

    pub fn is_retired(&self, request_id: RequestId) -> bool {
        self.retired.contains(&request_id)
    }

    /// Whether any request for `paper_id` is waiting on the oracle
    pub fn has_pending_for(&self, paper_id: PaperId) -> bool {
        self.pending
            .values()
            .any(|e| e.request.paper_id() == paper_id)
    }

    /// Whether a reveal for `paper_id` is waiting on the oracle
    pub fn has_reveal_for(&self, paper_id: PaperId) -> bool {
        self.pending
            .values()
            .any(|e| e.request == PendingRequest::Reveal(paper_id))
    }

    /// Ids issued more than `ttl_secs` before `now`, oldest first
    pub fn expired(&self, now: u64, ttl_secs: u64) -> Vec<RequestId> {
        let mut expired: Vec<_> = self
            .pending
            .iter()
            .filter(|(_, e)| now.saturating_sub(e.issued_at) > ttl_secs)
            .map(|(id, e)| (e.issued_at, *id))
            .collect();
        expired.sort();
        expired.into_iter().map(|(_, id)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
