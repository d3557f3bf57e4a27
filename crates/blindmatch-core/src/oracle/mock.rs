//! Mock decryption oracle for testing
//!
//! NOT SECURE - "decrypts" by looking plaintexts up in a table the test
//! registered beforehand. Attestations are real Ed25519 signatures from a
//! key the mock generates for itself, so proof verification is exercised
//! end to end.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tokio::sync::Notify;

use super::{Callback, DecryptedValues, DecryptionOracle, OracleRequest, OracleResponse};
use crate::error::{CoreError, CoreResult};
use crate::types::{CiphertextHandle, RequestId};
use crate::verify::{SignerSet, sign_attestation};

pub struct MockOracle {
    signing_key: SigningKey,
    next_id: AtomicU64,
    plaintexts: Mutex<HashMap<CiphertextHandle, Vec<u8>>>,
    outstanding: Mutex<VecDeque<OracleRequest>>,
    notify: Notify,
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOracle {
    pub fn new() -> Self {
        Self::with_key(SigningKey::generate(&mut OsRng))
    }

    pub fn with_key(signing_key: SigningKey) -> Self {
        Self {
            signing_key,
            next_id: AtomicU64::new(1),
            plaintexts: Mutex::new(HashMap::new()),
            outstanding: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// The key this oracle attests with
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The attesting key in the form `verifier.signers` expects
    pub fn verifying_key_base58(&self) -> String {
        bs58::encode(self.verifying_key().as_bytes()).into_string()
    }

    /// A verifier that trusts exactly this oracle
    pub fn signer_set(&self) -> SignerSet {
        SignerSet::single(self.verifying_key())
    }

    /// Never issue `request_id` or anything below it
    pub fn skip_past(&self, request_id: RequestId) {
        self.next_id
            .fetch_max(request_id.0.saturating_add(1), Ordering::SeqCst);
    }

    /// Register the plaintext behind a handle
    ///
    /// Unregistered handles decrypt to an empty value.
    pub fn set_plaintext(&self, handle: CiphertextHandle, plaintext: impl Into<Vec<u8>>) {
        if let Ok(mut plaintexts) = self.plaintexts.lock() {
            plaintexts.insert(handle, plaintext.into());
        }
    }

    /// Take every request not yet handed out
    pub fn drain(&self) -> Vec<OracleRequest> {
        self.outstanding
            .lock()
            .map(|mut q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Number of requests waiting to be answered
    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Wait for the next request
    pub async fn next_request(&self) -> OracleRequest {
        loop {
            let notified = self.notify.notified();
            if let Some(request) = self.outstanding.lock().ok().and_then(|mut q| q.pop_front()) {
                return request;
            }
            notified.await;
        }
    }

    /// Decrypt and attest a request
    pub fn respond(&self, request: &OracleRequest) -> OracleResponse {
        let values = {
            let plaintexts = self
                .plaintexts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            request
                .handles
                .iter()
                .map(|handle| plaintexts.get(handle).cloned().unwrap_or_default())
                .collect()
        };

        let cleartext = DecryptedValues(values).encode();
        let proof = sign_attestation(&self.signing_key, request.request_id, &cleartext);

        OracleResponse {
            request_id: request.request_id,
            cleartext,
            proof,
        }
    }
}

#[async_trait]
impl DecryptionOracle for MockOracle {
    fn name(&self) -> &'static str {
        "Mock (TESTING ONLY)"
    }

    async fn request(
        &self,
        handles: &[CiphertextHandle],
        callback: Callback,
    ) -> CoreResult<RequestId> {
        let request_id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        tracing::debug!(
            %request_id,
            handles = handles.len(),
            callback = callback.as_str(),
            "mock oracle accepted request"
        );

        self.outstanding
            .lock()
            .map_err(|_| CoreError::Oracle("mock oracle queue poisoned".into()))?
            .push_back(OracleRequest {
                request_id,
                handles: handles.to_vec(),
                callback,
            });
        self.notify.notify_one();

        Ok(request_id)
    }
}
