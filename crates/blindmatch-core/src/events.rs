//! Append-only domain event log

use std::sync::RwLock;

use serde::Serialize;

use crate::types::{PaperId, RequestId, ReviewerId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    PaperSubmitted {
        paper_id: PaperId,
        timestamp: u64,
    },
    ReviewerAdded {
        reviewer_id: ReviewerId,
    },
    MatchingRequested {
        paper_id: PaperId,
        request_id: RequestId,
    },
    /// Carries no reviewer: the match stays sealed until `MatchRevealed`
    MatchComputed {
        paper_id: PaperId,
    },
    MatchAcknowledged {
        paper_id: PaperId,
    },
    RevealRequested {
        paper_id: PaperId,
        request_id: RequestId,
    },
    MatchRevealed {
        paper_id: PaperId,
        reviewer_id: ReviewerId,
    },
    ProofRejected {
        request_id: RequestId,
    },
    RequestCancelled {
        request_id: RequestId,
    },
    RequestExpired {
        request_id: RequestId,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1
    pub sequence: u64,
    /// Unix seconds
    pub recorded_at: u64,
    #[serde(flatten)]
    pub event: MatchEvent,
}

/// Events are only ever appended; sequence numbers have no gaps.
#[derive(Default)]
pub struct EventLog {
    records: RwLock<Vec<EventRecord>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: MatchEvent, recorded_at: u64) -> u64 {
        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let sequence = records.len() as u64 + 1;
        tracing::debug!(sequence, ?event, "event emitted");
        records.push(EventRecord {
            sequence,
            recorded_at,
            event,
        });
        sequence
    }

    /// Records with a sequence number greater than `after`
    pub fn since(&self, after: u64) -> Vec<EventRecord> {
        let records = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(records.len());
        records[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .map(|r| r.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
