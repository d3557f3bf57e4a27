//! blindmatch-core: oracle-mediated matching over encrypted records
//!
//! Papers and reviewer profiles arrive as opaque ciphertext handles. A
//! match is computed only after an external decryption oracle answers a
//! request for the paper's descriptors, and the matched reviewer is only
//! disclosed after a second, independent oracle round-trip.
//!
//! ## Features
//!
//! | Feature  | Description                    |
//! |----------|--------------------------------|
//! | (none)   | In-memory record store only    |
//! | `sqlite` | SQLite records and ledger      |
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blindmatch_core::{
//!     InMemoryRecordStore, LowestIdEvaluator, MatchingService, MockOracle,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let oracle = Arc::new(MockOracle::new());
//!     let service = MatchingService::new(
//!         Arc::new(InMemoryRecordStore::new()),
//!         oracle.clone(),
//!         Arc::new(oracle.signer_set()),
//!         Arc::new(LowestIdEvaluator),
//!     );
//!
//!     let paper = service.submit_paper(paper_ciphertexts).await?;
//!     service.add_reviewer(reviewer_ciphertexts).await?;
//!
//!     // Issue the request, then deliver the oracle's answer
//!     service.request_matching(paper.id).await?;
//!     for request in oracle.drain() {
//!         let answer = oracle.respond(&request);
//!         service
//!             .process_matching(answer.request_id, &answer.cleartext, &answer.proof)
//!             .await?;
//!     }
//!
//!     // Second round-trip discloses the match
//!     service.reveal_matched_reviewer(paper.id).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod evaluator;
pub mod events;
pub mod memory;
pub mod oracle;
pub mod pending;
pub mod records;
pub mod service;
pub mod store;
pub mod types;
pub mod verify;

#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use evaluator::{LowestIdEvaluator, MatchEvaluator, Selection};
pub use events::{EventLog, EventRecord, MatchEvent};
pub use memory::InMemoryRecordStore;
pub use oracle::{
    Callback, DecryptedValues, DecryptionOracle, MockOracle, OracleRequest, OracleResponse,
};
pub use pending::{PendingEntry, PendingRequest};
pub use records::{
    EncryptedPaper, EncryptedReviewer, MatchResult, MatchView, PaperCiphertexts,
    PaperDescriptors, ReviewerCiphertexts,
};
pub use service::{MatchingService, PaperState, ServicePolicy};
pub use store::{LedgerSnapshot, LedgerStore, RecordStore};
pub use types::{CiphertextHandle, PaperId, RequestId, ReviewerId, unix_now};
pub use verify::{ProofVerifier, SignerSet};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;
