//! Host-to-Host (H2H) Cashback Disbursement
//!
//! Cashback is paid out through third-party wallet providers. Each provider
//! is one [`H2hProvider`] implementation; the [`H2hFactory`] picks the
//! provider for a wallet code from the cached pricing index.
//!
//! ```text
//! send_cashback(req)
//!   -> PricingCacheReader::lookup(WALLET)      MerchantCodeInvalid
//!   -> providers[pricing[0].provider_code]     BadPayload
//!   -> provider.send_cashback(req)             H2hCashbackFailed
//!   -> H2hReceipt { .., host_code }
//! ```
//!
//! Delivery is at-least-once: the transport retries, and providers are
//! expected to de-duplicate on `kezbek_ref_no`.

pub mod config;
pub mod factory;
pub mod providers;
pub mod transport;

pub use config::H2hConfig;
pub use factory::H2hFactory;
pub use transport::{H2hTransport, TransportConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;

/// Errors raised inside an adapter; never shown to callers
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Response decode error: {0}")]
    Decode(String),

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Token cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ProviderError {
    /// Whether a retry at the transport boundary may help
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Disbursement request, built per payout and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H2hSendCashbackRequest {
    pub amount: Decimal,
    pub wallet_code: String,
    pub destination: String,
    pub notes: String,
    pub kezbek_ref_no: String,
    #[serde(default)]
    pub host_code: Option<String>,
}

/// What an adapter reports on success
#[derive(Debug, Clone, PartialEq)]
pub struct H2hTransfer {
    pub transaction_id: String,
    pub transaction_timestamp: DateTime<Utc>,
}

/// Normalized dispatch result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct H2hReceipt {
    pub transaction_id: String,
    pub transaction_timestamp: DateTime<Utc>,
    /// Provider code that carried the transfer
    pub host_code: String,
}

/// One wallet provider integration
///
/// Implementations make exactly one logical outbound transfer per call
/// (the transport may retry it).
#[async_trait]
pub trait H2hProvider: Send + Sync {
    /// Provider code as it appears in the pricing index
    fn code(&self) -> &'static str;

    async fn send_cashback(
        &self,
        req: &H2hSendCashbackRequest,
    ) -> Result<H2hTransfer, ProviderError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(
            ProviderError::Rejected {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::Rejected {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ProviderError::Decode("eof".into()).is_retryable());
        assert!(!ProviderError::Auth("denied".into()).is_retryable());
    }
}
