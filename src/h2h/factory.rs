//! Provider dispatch
//!
//! Routes a cashback request to the cheapest provider for its wallet code
//! and normalizes the outcome into an [`H2hReceipt`] or a [`BusinessError`].

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::config::H2hConfig;
use super::providers;
use super::{H2hProvider, H2hReceipt, H2hSendCashbackRequest, ProviderError};
use crate::cache::CacheStore;
use crate::error::BusinessError;
use crate::pricing::{PricingCacheReader, PricingError};

pub struct H2hFactory {
    pricing: PricingCacheReader,
    providers: HashMap<&'static str, Arc<dyn H2hProvider>>,
}

impl H2hFactory {
    pub fn new(pricing: PricingCacheReader) -> Self {
        Self {
            pricing,
            providers: HashMap::new(),
        }
    }

    /// Register a provider under its own code, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn H2hProvider>) {
        self.providers.insert(provider.code(), provider);
    }

    /// Factory with every configured provider registered
    pub fn from_config(
        config: &H2hConfig,
        pricing: PricingCacheReader,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, ProviderError> {
        let mut factory = Self::new(pricing);
        for provider in providers::build_all(config, cache)? {
            factory.register(provider);
        }
        Ok(factory)
    }

    pub fn provider_codes(&self) -> Vec<&'static str> {
        let mut codes: Vec<_> = self.providers.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    /// Disburse cashback through the provider chosen for `req.wallet_code`
    ///
    /// Exactly one adapter is invoked on the success path and none when the
    /// wallet code or provider code cannot be resolved.
    pub async fn send_cashback(
        &self,
        req: &H2hSendCashbackRequest,
    ) -> Result<H2hReceipt, BusinessError> {
        let wallet_code = req.wallet_code.trim().to_uppercase();

        let pricing = match self.pricing.lookup(&wallet_code).await {
            Ok(p) => p,
            Err(PricingError::NotFound(_)) => {
                warn!(wallet_code = %wallet_code, "No pricing for wallet code");
                return Err(BusinessError::MerchantCodeInvalid);
            }
            Err(e) => {
                warn!(wallet_code = %wallet_code, error = %e, "Pricing lookup failed");
                return Err(BusinessError::MerchantCodeInvalid);
            }
        };

        // Non-empty: lookup() reports an empty list as NotFound
        let provider_code = pricing[0].provider_code.as_str();
        let Some(provider) = self.providers.get(provider_code) else {
            warn!(
                wallet_code = %wallet_code,
                provider_code = %provider_code,
                "Pricing names an unregistered provider"
            );
            return Err(BusinessError::BadPayload(format!(
                "unknown provider code {}",
                provider_code
            )));
        };

        let mut outbound = req.clone();
        outbound.wallet_code = wallet_code.clone();
        outbound.host_code = Some(provider.code().to_string());

        match provider.send_cashback(&outbound).await {
            Ok(transfer) => {
                info!(
                    provider = provider.code(),
                    wallet_code = %wallet_code,
                    kezbek_ref_no = %req.kezbek_ref_no,
                    transaction_id = %transfer.transaction_id,
                    "Cashback disbursed"
                );
                Ok(H2hReceipt {
                    transaction_id: transfer.transaction_id,
                    transaction_timestamp: transfer.transaction_timestamp,
                    host_code: provider.code().to_string(),
                })
            }
            Err(e) => {
                error!(
                    provider = provider.code(),
                    wallet_code = %wallet_code,
                    kezbek_ref_no = %req.kezbek_ref_no,
                    error = %e,
                    "H2H transfer failed"
                );
                Err(BusinessError::H2hCashbackFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, replace_json};
    use crate::h2h::mock::MockProvider;
    use crate::pricing::{PRICING_NAMESPACE, ProviderPricing};
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn pricing(provider: &str, fee: i64) -> ProviderPricing {
        ProviderPricing {
            wallet_code: "LSAJA".to_string(),
            provider_code: provider.to_string(),
            provider_name: provider.to_string(),
            fee: Decimal::from(fee),
        }
    }

    fn request(wallet: &str) -> H2hSendCashbackRequest {
        H2hSendCashbackRequest {
            amount: Decimal::from(1500),
            wallet_code: wallet.to_string(),
            destination: "628100".to_string(),
            notes: "cashback".to_string(),
            kezbek_ref_no: "KZB-9".to_string(),
            host_code: None,
        }
    }

    struct Fixture {
        factory: H2hFactory,
        linksaja: Arc<MockProvider>,
        payda: Arc<MockProvider>,
    }

    async fn fixture(entries: Vec<ProviderPricing>) -> Fixture {
        let cache = Arc::new(MemoryCache::new());
        replace_json(cache.as_ref(), PRICING_NAMESPACE, "LSAJA", &entries, Duration::ZERO)
            .await
            .unwrap();

        let linksaja = Arc::new(MockProvider::new(providers::LINKSAJA));
        let payda = Arc::new(MockProvider::new(providers::PAYDA));
        let mut factory = H2hFactory::new(PricingCacheReader::new(cache));
        factory.register(linksaja.clone());
        factory.register(payda.clone());

        Fixture {
            factory,
            linksaja,
            payda,
        }
    }

    #[tokio::test]
    async fn test_routes_to_first_pricing_entry() {
        let f = fixture(vec![pricing("PAYDAH2H", 500), pricing("LSAJAH2H", 750)]).await;

        let receipt = f.factory.send_cashback(&request("lsaja")).await.unwrap();

        assert_eq!(receipt.host_code, "PAYDAH2H");
        assert_eq!(receipt.transaction_id, "PAYDAH2H-KZB-9");
        assert_eq!(f.payda.calls(), 1);
        assert_eq!(f.linksaja.calls(), 0);

        let sent = f.payda.last_request().unwrap();
        assert_eq!(sent.wallet_code, "LSAJA");
        assert_eq!(sent.host_code.as_deref(), Some("PAYDAH2H"));
    }

    #[tokio::test]
    async fn test_unknown_wallet_calls_no_adapter() {
        let f = fixture(vec![pricing("LSAJAH2H", 750)]).await;

        let err = f.factory.send_cashback(&request("GOPAY")).await.unwrap_err();

        assert_eq!(err, BusinessError::MerchantCodeInvalid);
        assert_eq!(f.linksaja.calls() + f.payda.calls(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_provider_code_is_bad_payload() {
        let f = fixture(vec![pricing("GHOSTH2H", 100)]).await;

        let err = f.factory.send_cashback(&request("LSAJA")).await.unwrap_err();

        assert_eq!(err.code(), "BAD_PAYLOAD");
        assert_eq!(f.linksaja.calls() + f.payda.calls(), 0);
    }

    #[tokio::test]
    async fn test_adapter_failure_maps_to_h2h_cashback_failed() {
        let f = fixture(vec![pricing("LSAJAH2H", 750)]).await;
        f.linksaja.set_fail(true);

        let err = f.factory.send_cashback(&request("LSAJA")).await.unwrap_err();

        assert_eq!(err, BusinessError::H2hCashbackFailed);
        assert_eq!(f.linksaja.calls(), 1);
    }

    #[test]
    fn test_register_replaces_same_code() {
        let cache = Arc::new(MemoryCache::new());
        let mut factory = H2hFactory::new(PricingCacheReader::new(cache));
        factory.register(Arc::new(MockProvider::new(providers::TOPIN)));
        factory.register(Arc::new(MockProvider::new(providers::TOPIN)));
        factory.register(Arc::new(MockProvider::new(providers::ISIK)));

        assert_eq!(factory.provider_codes(), vec!["ISIKH2H", "TOPINH2H"]);
    }
}
