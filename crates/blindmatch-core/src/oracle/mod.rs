//! Decryption oracle interface
//!
//! The oracle is an external service. We hand it a batch of ciphertext
//! handles and the callback it should answer on; it hands back a request
//! id straight away and, some time later and out of band, delivers the
//! cleartext together with an attestation over it. Nothing here trusts
//! that cleartext until a [`ProofVerifier`](crate::verify::ProofVerifier)
//! has checked it.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{CiphertextHandle, RequestId};

pub use mock::MockOracle;

/// Which service entry point the oracle must answer on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callback {
    /// Deliver decrypted paper descriptors for matching
    ProcessMatching,
    /// Deliver the decrypted match score for disclosure
    FinalizeReveal,
}

impl Callback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Callback::ProcessMatching => "process_matching",
            Callback::FinalizeReveal => "finalize_reveal",
        }
    }
}

/// Fire-and-forget access to an external decryption service
#[async_trait]
pub trait DecryptionOracle: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// Submit handles for decryption
    ///
    /// Returns once the oracle has accepted the request. The answer arrives
    /// later through `callback`, exactly once per accepted request.
    async fn request(
        &self,
        handles: &[CiphertextHandle],
        callback: Callback,
    ) -> CoreResult<RequestId>;
}

/// A request as seen by the oracle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub request_id: RequestId,
    pub handles: Vec<CiphertextHandle>,
    pub callback: Callback,
}

/// An oracle answer, as delivered to a callback
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleResponse {
    pub request_id: RequestId,
    pub cleartext: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Cleartext wire format: one decrypted value per requested handle, in
/// request order, as a JSON array of byte arrays
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecryptedValues(pub Vec<Vec<u8>>);

impl DecryptedValues {
    pub fn encode(&self) -> Vec<u8> {
        // A list of byte vectors always serializes
        serde_json::to_vec(&self.0).unwrap_or_default()
    }

    pub fn decode(cleartext: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(cleartext)
            .map(Self)
            .map_err(|e| CoreError::MalformedCleartext(e.to_string()))
    }

    /// Decode a cleartext that must carry exactly one value
    pub fn decode_single(cleartext: &[u8]) -> CoreResult<Vec<u8>> {
        let Self(mut values) = Self::decode(cleartext)?;
        if values.len() != 1 {
            return Err(CoreError::MalformedCleartext(format!(
                "expected 1 value, got {}",
                values.len()
            )));
        }
        Ok(values.remove(0))
    }
}
