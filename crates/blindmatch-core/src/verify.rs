//! Oracle attestation verification
//!
//! An attestation binds a cleartext to the request it answers. The signed
//! payload is
//!
//! ```text
//! "blindmatch-attestation-v1" || request_id (u64 LE) || blake3(cleartext)
//! ```
//!
//! and a proof is one or more 64-byte Ed25519 signatures over it,
//! concatenated.

use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{CoreError, CoreResult};
use crate::types::RequestId;

const ATTESTATION_DOMAIN: &[u8] = b"blindmatch-attestation-v1";

/// Checks that a cleartext really came from the oracle for this request
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, request_id: RequestId, cleartext: &[u8], proof: &[u8]) -> CoreResult<()>;
}

/// Compute the bytes an oracle signer signs
pub fn attestation_payload(request_id: RequestId, cleartext: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(ATTESTATION_DOMAIN.len() + 8 + 32);
    payload.extend(ATTESTATION_DOMAIN);
    payload.extend(request_id.0.to_le_bytes());
    payload.extend(blake3::hash(cleartext).as_bytes());
    payload
}

/// Produce one signer's share of a proof
pub fn sign_attestation(key: &SigningKey, request_id: RequestId, cleartext: &[u8]) -> Vec<u8> {
    key.sign(&attestation_payload(request_id, cleartext))
        .to_bytes()
        .to_vec()
}

/// A fixed set of oracle signing keys and how many must agree
#[derive(Clone, Debug)]
pub struct SignerSet {
    signers: Vec<VerifyingKey>,
    threshold: usize,
}

impl SignerSet {
    /// Keys must be distinct, otherwise one party could meet the threshold alone
    pub fn new(signers: Vec<VerifyingKey>, threshold: usize) -> CoreResult<Self> {
        if signers.is_empty() {
            return Err(CoreError::InvalidKey("signer set is empty".into()));
        }
        for (i, key) in signers.iter().enumerate() {
            if signers[..i].contains(key) {
                return Err(CoreError::InvalidKey(format!(
                    "duplicate signer {}",
                    bs58::encode(key.as_bytes()).into_string()
                )));
            }
        }
        if threshold == 0 || threshold > signers.len() {
            return Err(CoreError::InvalidKey(format!(
                "threshold {threshold} not satisfiable by {} signers",
                signers.len()
            )));
        }
        Ok(Self { signers, threshold })
    }

    /// Trust a single signer
    pub fn single(signer: VerifyingKey) -> Self {
        Self {
            signers: vec![signer],
            threshold: 1,
        }
    }

    /// Parse base58-encoded Ed25519 public keys
    pub fn from_base58(keys: &[String], threshold: usize) -> CoreResult<Self> {
        let signers = keys
            .iter()
            .map(|key| {
                let bytes = bs58::decode(key)
                    .into_vec()
                    .map_err(|_| CoreError::InvalidKey(format!("invalid base58: {key}")))?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| CoreError::InvalidKey("Ed25519 key must be 32 bytes".into()))?;
                VerifyingKey::from_bytes(&arr)
                    .map_err(|e| CoreError::InvalidKey(format!("invalid Ed25519 key: {e}")))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Self::new(signers, threshold)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}

impl ProofVerifier for SignerSet {
    fn verify(&self, request_id: RequestId, cleartext: &[u8], proof: &[u8]) -> CoreResult<()> {
        let reject = |reason: String| CoreError::ProofRejected { request_id, reason };

        if proof.is_empty() || proof.len() % SIGNATURE_LENGTH != 0 {
            return Err(reject(format!(
                "proof length {} is not a multiple of {SIGNATURE_LENGTH}",
                proof.len()
            )));
        }

        let payload = attestation_payload(request_id, cleartext);
        let mut endorsed = vec![false; self.signers.len()];

        for chunk in proof.chunks_exact(SIGNATURE_LENGTH) {
            let mut bytes = [0u8; SIGNATURE_LENGTH];
            bytes.copy_from_slice(chunk);
            let signature = Signature::from_bytes(&bytes);

            // Each signer counts once no matter how often its signature repeats
            if let Some(idx) = self
                .signers
                .iter()
                .enumerate()
                .position(|(i, key)| !endorsed[i] && key.verify(&payload, &signature).is_ok())
            {
                endorsed[idx] = true;
            }
        }

        let count = endorsed.iter().filter(|e| **e).count();
        if count < self.threshold {
            return Err(reject(format!(
                "{count} of {} required signers attested",
                self.threshold
            )));
        }

        Ok(())
    }
}
