use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub requests: RequestConfig,

    #[serde(default)]
    pub consent: ConsentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String, // "memory", "sqlite"
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_backend")]
    pub backend: String, // "mock", "http"
    pub url: Option<String>,
    /// Where the oracle should deliver answers, e.g. `https://host:7333`
    pub callback_base_url: Option<String>,
    /// How long a submission may take before it fails. 0 waits forever.
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VerifierConfig {
    /// Base58 Ed25519 public keys of the oracle's attesting parties
    #[serde(default)]
    pub signers: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RequestConfig {
    /// 0 disables expiry
    #[serde(default)]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConsentConfig {
    #[serde(default)]
    pub require_reviewer_ack: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            sqlite_path: None,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: default_oracle_backend(),
            url: None,
            callback_base_url: None,
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            signers: Vec::new(),
            threshold: default_threshold(),
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 0,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RequestConfig {
    pub fn ttl(&self) -> Option<u64> {
        (self.ttl_secs > 0).then_some(self.ttl_secs)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    7333
}
fn default_storage_backend() -> String {
    "memory".into()
}
fn default_oracle_backend() -> String {
    "mock".into()
}
fn default_oracle_timeout_secs() -> u64 {
    30
}
fn default_threshold() -> usize {
    1
}
fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage: StorageConfig::default(),
            oracle: OracleConfig::default(),
            verifier: VerifierConfig::default(),
            requests: RequestConfig::default(),
            consent: ConsentConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("blindmatch-server.toml"))
                .merge(Env::prefixed("BLINDMATCH_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment.extract()?;
        Ok(config)
    }
}
