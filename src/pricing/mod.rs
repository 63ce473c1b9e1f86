//! H2H Pricing Index
//!
//! Provider fees grouped by wallet code. The warm job writes one JSON array
//! per wallet code, sorted by fee ascending; the dispatch factory reads it
//! and routes to the first entry.
//!
//! ```text
//! h2h_pricing:LSAJA -> [{"provider_code":"LSAJAH2H","fee":"750",...}, ...]
//! ```

pub mod warmer;

pub use warmer::{PgPricingSource, PricingSource, PricingWarmer};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheStore, get_json};

/// Default cache namespace for the pricing index
pub const PRICING_NAMESPACE: &str = "h2h_pricing";

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("No pricing for wallet code {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One provider's fee for a wallet code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProviderPricing {
    pub wallet_code: String,
    pub provider_code: String,
    pub provider_name: String,
    pub fee: Decimal,
}

/// Reads the pricing index from the cache
#[derive(Clone)]
pub struct PricingCacheReader {
    cache: Arc<dyn CacheStore>,
    namespace: String,
}

impl PricingCacheReader {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self::with_namespace(cache, PRICING_NAMESPACE)
    }

    pub fn with_namespace(cache: Arc<dyn CacheStore>, namespace: impl Into<String>) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
        }
    }

    /// Providers for a wallet code, in cached (fee ascending) order
    ///
    /// Absent keys, unparseable values and empty arrays are all `NotFound`.
    /// Backend failures are reported as `Cache` so they can be told apart in
    /// logs; the dispatch factory treats both the same.
    pub async fn lookup(&self, wallet_code: &str) -> Result<Vec<ProviderPricing>, PricingError> {
        let code = wallet_code.trim().to_uppercase();

        let providers: Vec<ProviderPricing> =
            match get_json(self.cache.as_ref(), &self.namespace, &code).await {
                Ok(v) => v,
                Err(CacheError::NotFound(_)) => {
                    debug!(wallet_code = %code, "Pricing cache miss");
                    return Err(PricingError::NotFound(code));
                }
                Err(CacheError::Codec(e)) => {
                    warn!(wallet_code = %code, error = %e, "Malformed pricing cache entry");
                    return Err(PricingError::NotFound(code));
                }
                Err(e) => return Err(e.into()),
            };

        if providers.is_empty() {
            return Err(PricingError::NotFound(code));
        }

        Ok(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::time::Duration;

    fn pricing(wallet: &str, provider: &str, fee: i64) -> ProviderPricing {
        ProviderPricing {
            wallet_code: wallet.to_string(),
            provider_code: provider.to_string(),
            provider_name: provider.to_string(),
            fee: Decimal::from(fee),
        }
    }

    async fn reader_with(entries: &[(&str, &str)]) -> PricingCacheReader {
        let cache = Arc::new(MemoryCache::new());
        for (field, value) in entries {
            cache
                .set(PRICING_NAMESPACE, field, value, Duration::ZERO)
                .await
                .unwrap();
        }
        PricingCacheReader::new(cache)
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive_and_keeps_order() {
        let list = vec![pricing("LSAJA", "LSAJAH2H", 750), pricing("LSAJA", "PAYDAH2H", 900)];
        let json = serde_json::to_string(&list).unwrap();
        let reader = reader_with(&[("LSAJA", &json)]).await;

        let found = reader.lookup("lsaja").await.unwrap();
        assert_eq!(found, list);
        assert_eq!(found[0].provider_code, "LSAJAH2H");
    }

    #[tokio::test]
    async fn test_lookup_missing_key() {
        let reader = reader_with(&[]).await;
        let err = reader.lookup("NOPE").await.unwrap_err();
        assert!(matches!(err, PricingError::NotFound(code) if code == "NOPE"));
    }

    #[tokio::test]
    async fn test_lookup_malformed_value_is_not_found() {
        let reader = reader_with(&[("BROKEN", r#"{"provider_code":"X"}"#)]).await;
        assert!(matches!(
            reader.lookup("BROKEN").await,
            Err(PricingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_empty_array_is_not_found() {
        let reader = reader_with(&[("EMPTY", "[]")]).await;
        assert!(matches!(
            reader.lookup("EMPTY").await,
            Err(PricingError::NotFound(_))
        ));
    }
}
