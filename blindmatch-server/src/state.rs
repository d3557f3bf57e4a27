use crate::config::Config;
use crate::oracle::{HttpOracle, spawn_mock_relay};
use blindmatch_core::{
    DecryptionOracle, InMemoryRecordStore, LedgerStore, LowestIdEvaluator, MatchingService,
    MockOracle, ProofVerifier, RecordStore, ServicePolicy, SignerSet, unix_now,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchingService>,
    pub config: Arc<Config>,
    /// Present only with the mock oracle backend
    pub mock_oracle: Option<Arc<MockOracle>>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let (records, ledger) = build_stores(config)?;

        // SECURITY: never fall back to the mock oracle - fail hard on misconfiguration
        let (oracle, verifier, mock_oracle): (
            Arc<dyn DecryptionOracle>,
            Arc<dyn ProofVerifier>,
            Option<Arc<MockOracle>>,
        ) = match config.oracle.backend.to_lowercase().as_str() {
            "mock" | "test" => {
                let mock = Arc::new(MockOracle::new());
                tracing::warn!(
                    signer = %mock.verifying_key_base58(),
                    "Using mock decryption oracle - NOT FOR PRODUCTION USE"
                );
                let oracle: Arc<dyn DecryptionOracle> = mock.clone();
                let verifier: Arc<dyn ProofVerifier> = Arc::new(mock.signer_set());
                (oracle, verifier, Some(mock))
            }
            "http" => {
                let url = config
                    .oracle
                    .url
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("http oracle requires oracle.url"))?;
                let callback_base_url = config.oracle.callback_base_url.clone().unwrap_or_else(
                    || format!("http://{}:{}", config.host, config.port),
                );
                if config.verifier.signers.is_empty() {
                    anyhow::bail!("http oracle requires at least one verifier.signers key");
                }
                let signers =
                    SignerSet::from_base58(&config.verifier.signers, config.verifier.threshold)
                        .map_err(|e| anyhow::anyhow!("Invalid verifier config: {e}"))?;
                tracing::info!(
                    signers = signers.len(),
                    threshold = signers.threshold(),
                    %url,
                    "using http decryption oracle"
                );
                let oracle: Arc<dyn DecryptionOracle> = Arc::new(HttpOracle::new(
                    url.as_str(),
                    callback_base_url,
                    config.oracle.timeout(),
                )?);
                let verifier: Arc<dyn ProofVerifier> = Arc::new(signers);
                (oracle, verifier, None)
            }
            other => {
                anyhow::bail!(
                    "Unknown oracle backend '{}'. Valid options: 'http', 'mock'",
                    other
                );
            }
        };

        let policy = ServicePolicy {
            require_reviewer_consent: config.consent.require_reviewer_ack,
            request_ttl_secs: config.requests.ttl(),
            oracle_timeout: config.oracle.timeout(),
        };
        let mut service =
            MatchingService::new(records, oracle, verifier, Arc::new(LowestIdEvaluator))
                .with_policy(policy);
        if let Some(ledger) = ledger {
            service = service.with_ledger_store(ledger).await?;
        }
        let service = Arc::new(service);

        if let Some(mock) = &mock_oracle {
            // A fresh mock counts from 1 again; restored ids must stay retired
            if let Some(last) = service.last_request_id() {
                mock.skip_past(last);
            }
            spawn_mock_relay(mock.clone(), service.clone());
        }

        Ok(Self {
            service,
            config: Arc::new(config.clone()),
            mock_oracle,
        })
    }
}

type Stores = (Arc<dyn RecordStore>, Option<Arc<dyn LedgerStore>>);

/// Record storage, plus a durable ledger when the backend has one
fn build_stores(config: &Config) -> anyhow::Result<Stores> {
    match config.storage.backend.as_str() {
        "memory" => Ok((Arc::new(InMemoryRecordStore::new()), None)),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config
                .storage
                .sqlite_path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("sqlite storage requires sqlite_path"))?;
            let store = Arc::new(blindmatch_core::SqliteRecordStore::open(path)?);
            tracing::info!(%path, "using sqlite storage");
            let records: Arc<dyn RecordStore> = store.clone();
            let ledger: Arc<dyn LedgerStore> = store;
            Ok((records, Some(ledger)))
        }
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => {
            anyhow::bail!("sqlite storage requested but built without the `sqlite` feature")
        }
        other => anyhow::bail!(
            "Unknown storage backend '{}'. Valid options: 'memory', 'sqlite'",
            other
        ),
    }
}

/// Periodically expire oracle requests older than the configured TTL
pub fn spawn_expiry_sweep(state: &AppState) -> Option<JoinHandle<()>> {
    let ttl = state.config.requests.ttl()?;
    let every = Duration::from_secs(state.config.requests.sweep_interval_secs.max(1));
    let service = state.service.clone();

    tracing::info!(ttl_secs = ttl, "request expiry enabled");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let expired = service.expire_pending(unix_now()).await;
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), "expired stale oracle requests");
            }
        }
    }))
}
