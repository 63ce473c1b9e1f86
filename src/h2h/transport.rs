//! Shared HTTP transport for provider adapters
//!
//! Fixed per-call timeout plus constant-backoff retry. Only transport
//! failures and 5xx responses are retried; a 4xx is final.

use backon::{ConstantBuilder, Retryable};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::ProviderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Additional attempts after the first one
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_count() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

pub struct H2hTransport {
    provider: &'static str,
    client: Client,
    config: TransportConfig,
}

impl H2hTransport {
    pub fn new(provider: &'static str, config: TransportConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                ProviderError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            provider,
            client,
            config,
        })
    }

    /// Send a request built by `build`, retrying per config, and decode the
    /// JSON body of a 2xx response.
    ///
    /// `build` is called once per attempt.
    pub async fn execute<T, F>(&self, build: F) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let backoff = ConstantBuilder::default()
            .with_delay(Duration::from_millis(self.config.retry_delay_ms))
            .with_max_times(self.config.retry_count);

        let build = &build;
        (move || async move { self.send_once(build(&self.client)).await })
            .retry(backoff)
            .when(ProviderError::is_retryable)
            .notify(|err, delay| {
                warn!(
                    provider = self.provider,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying H2H call"
                )
            })
            .await
    }

    async fn send_once<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ProviderError> {
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        debug!(provider = self.provider, status = status.as_u16(), "H2H response received");
        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Pong {
        ok: bool,
    }

    fn fast_config(retry_count: usize) -> TransportConfig {
        TransportConfig {
            timeout_ms: 2_000,
            retry_count,
            retry_delay_ms: 1,
        }
    }

    #[test]
    fn test_transport_config_defaults() {
        let config: TransportConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.retry_delay_ms, 500);
    }

    #[tokio::test]
    async fn test_execute_decodes_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/ping");
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;

        let transport = H2hTransport::new("TEST", fast_config(2)).unwrap();
        let url = server.url("/ping");
        let pong: Pong = transport.execute(|c| c.get(&url)).await.unwrap();

        assert!(pong.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_twice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky");
                then.status(503).body("unavailable");
            })
            .await;

        let transport = H2hTransport::new("TEST", fast_config(2)).unwrap();
        let url = server.url("/flaky");
        let err = transport
            .execute::<Pong, _>(|c| c.get(&url))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Rejected { status: 503, .. }));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/bad");
                then.status(400).body("bad request");
            })
            .await;

        let transport = H2hTransport::new("TEST", fast_config(2)).unwrap();
        let url = server.url("/bad");
        let err = transport
            .execute::<Pong, _>(|c| c.get(&url))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_bad_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/garbage");
                then.status(200).body("<html>");
            })
            .await;

        let transport = H2hTransport::new("TEST", fast_config(0)).unwrap();
        let url = server.url("/garbage");
        let err = transport
            .execute::<Pong, _>(|c| c.get(&url))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
