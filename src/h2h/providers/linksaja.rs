//! LinkSaja adapter
//!
//! Two calls: `POST /oauth/token` (only on token cache miss) and
//! `POST /v1/fund-transfer` with the bearer token.
//!
//! Token lifecycle:
//!
//! ```text
//! NoToken --miss--> Authenticating --ok--> Cached(ttl) --transfer--> Cached
//!    ^                    |                                   |
//!    |                    +--fail--> Failed                   |
//!    +------------------------- 401 on transfer --------------+
//! ```
//!
//! The token lives under one provider-wide cache key. Concurrent misses all
//! authenticate and the last write wins.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::LINKSAJA;
use crate::cache::{CacheError, CacheStore};
use crate::h2h::config::TokenProviderConfig;
use crate::h2h::transport::H2hTransport;
use crate::h2h::{H2hProvider, H2hSendCashbackRequest, H2hTransfer, ProviderError};

/// Cache namespace for provider tokens
pub const TOKEN_NAMESPACE: &str = "h2h_token";

#[derive(Serialize)]
struct AuthorizationRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct AuthorizationResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Serialize)]
struct FundTransferRequest<'a> {
    amount: Decimal,
    destination: &'a str,
    notes: &'a str,
    reference_no: &'a str,
    wallet_code: &'a str,
}

#[derive(Deserialize)]
struct FundTransferResponse {
    confirmation_id: String,
}

pub struct LinkSajaProvider {
    transport: H2hTransport,
    config: TokenProviderConfig,
    cache: Arc<dyn CacheStore>,
}

impl LinkSajaProvider {
    pub fn new(
        config: TokenProviderConfig,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, ProviderError> {
        let transport = H2hTransport::new(LINKSAJA, config.transport.clone())?;
        Ok(Self {
            transport,
            config,
            cache,
        })
    }

    /// Cached token, or a fresh one from the authorization endpoint
    async fn token(&self) -> Result<String, ProviderError> {
        match self.cache.get(TOKEN_NAMESPACE, LINKSAJA).await {
            Ok(token) => return Ok(token),
            Err(CacheError::NotFound(_)) => debug!(provider = LINKSAJA, "Token cache miss"),
            Err(e) => warn!(provider = LINKSAJA, error = %e, "Token cache read failed"),
        }

        let auth = self.authorize().await?;
        let ttl = self.token_ttl(auth.expires_in);

        if let Err(e) = self
            .cache
            .set(TOKEN_NAMESPACE, LINKSAJA, &auth.access_token, ttl)
            .await
        {
            warn!(provider = LINKSAJA, error = %e, "Failed to cache token");
        }

        info!(provider = LINKSAJA, ttl_secs = ttl.as_secs(), "Authorized");
        Ok(auth.access_token)
    }

    async fn authorize(&self) -> Result<AuthorizationResponse, ProviderError> {
        let url = format!("{}/oauth/token", self.config.base_url);
        let body = AuthorizationRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
        };

        self.transport
            .execute(|c| c.post(&url).json(&body))
            .await
            .map_err(|e| ProviderError::Auth(e.to_string()))
    }

    /// Drop a token the provider no longer accepts; the next send re-authorizes
    async fn evict_token(&self) {
        match self.cache.delete(TOKEN_NAMESPACE, LINKSAJA).await {
            Ok(()) => info!(provider = LINKSAJA, "Rejected token evicted"),
            Err(e) => warn!(provider = LINKSAJA, error = %e, "Failed to evict token"),
        }
    }

    /// Shorter of the configured TTL and the provider's `expires_in`
    fn token_ttl(&self, expires_in: Option<u64>) -> Duration {
        let secs = match expires_in {
            Some(s) if s > 0 => s.min(self.config.token_ttl_secs),
            _ => self.config.token_ttl_secs,
        };
        Duration::from_secs(secs.max(1))
    }
}

#[async_trait]
impl H2hProvider for LinkSajaProvider {
    fn code(&self) -> &'static str {
        LINKSAJA
    }

    async fn send_cashback(
        &self,
        req: &H2hSendCashbackRequest,
    ) -> Result<H2hTransfer, ProviderError> {
        let token = self.token().await?;

        let url = format!("{}/v1/fund-transfer", self.config.base_url);
        let body = FundTransferRequest {
            amount: req.amount,
            destination: &req.destination,
            notes: &req.notes,
            reference_no: &req.kezbek_ref_no,
            wallet_code: &req.wallet_code,
        };

        let resp: FundTransferResponse = match self
            .transport
            .execute(|c| c.post(&url).bearer_auth(&token).json(&body))
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                if matches!(e, ProviderError::Rejected { status: 401, .. }) {
                    self.evict_token().await;
                }
                return Err(e);
            }
        };

        Ok(H2hTransfer {
            transaction_id: resp.confirmation_id,
            transaction_timestamp: Utc::now(),
        })
    }
}
