//! Oracle transports
//!
//! `HttpOracle` forwards requests to a remote decryption service, which
//! answers on `/oracle/matching` and `/oracle/reveal`. With the mock
//! backend the relay task plays that service in-process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blindmatch_core::{
    Callback, CiphertextHandle, CoreError, CoreResult, DecryptionOracle, MatchingService,
    MockOracle, RequestId,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

#[derive(Serialize)]
struct SubmitRequest<'a> {
    handles: &'a [CiphertextHandle],
    callback: Callback,
    callback_url: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    request_id: RequestId,
}

pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
    callback_base_url: String,
}

impl HttpOracle {
    /// `timeout` bounds each submission, connect included
    pub fn new(
        url: impl Into<String>,
        callback_base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> CoreResult<Self> {
        let mut client = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            client = client.timeout(timeout);
        }
        let client = client
            .build()
            .map_err(|e| CoreError::Oracle(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            callback_base_url: callback_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn callback_url(&self, callback: Callback) -> String {
        let path = match callback {
            Callback::ProcessMatching => "matching",
            Callback::FinalizeReveal => "reveal",
        };
        format!("{}/oracle/{}", self.callback_base_url, path)
    }
}

#[async_trait]
impl DecryptionOracle for HttpOracle {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn request(
        &self,
        handles: &[CiphertextHandle],
        callback: Callback,
    ) -> CoreResult<RequestId> {
        let body = SubmitRequest {
            handles,
            callback,
            callback_url: self.callback_url(callback),
        };

        let response = self
            .client
            .post(format!("{}/requests", self.url))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CoreError::Oracle(e.to_string()))?;

        let SubmitResponse { request_id } = response
            .json()
            .await
            .map_err(|e| CoreError::Oracle(format!("bad oracle response: {e}")))?;

        tracing::debug!(
            %request_id,
            handles = handles.len(),
            callback = callback.as_str(),
            "oracle accepted request"
        );
        Ok(request_id)
    }
}

/// Answer every request the mock oracle receives through the service callbacks
pub fn spawn_mock_relay(oracle: Arc<MockOracle>, service: Arc<MatchingService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let request = oracle.next_request().await;
            let answer = oracle.respond(&request);

            let outcome = match request.callback {
                Callback::ProcessMatching => service
                    .process_matching(answer.request_id, &answer.cleartext, &answer.proof)
                    .await
                    .map(drop),
                Callback::FinalizeReveal => service
                    .finalize_reveal(answer.request_id, &answer.cleartext, &answer.proof)
                    .await
                    .map(drop),
            };

            if let Err(e) = outcome {
                tracing::warn!(
                    request_id = %request.request_id,
                    callback = request.callback.as_str(),
                    error = %e,
                    "mock relay callback failed"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_urls() {
        let oracle = HttpOracle::new("http://oracle", "http://me:7333/", None).unwrap();
        assert_eq!(
            oracle.callback_url(Callback::ProcessMatching),
            "http://me:7333/oracle/matching"
        );
        assert_eq!(
            oracle.callback_url(Callback::FinalizeReveal),
            "http://me:7333/oracle/reveal"
        );
    }
}
