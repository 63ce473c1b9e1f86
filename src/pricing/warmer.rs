//! Pricing warm job
//!
//! Loads active provider fees from PostgreSQL and rewrites the cache one
//! wallet code at a time. Wallet codes that lost every active row are
//! removed, so dispatch rejects them instead of routing on stale fees.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{PRICING_NAMESPACE, PricingError, ProviderPricing};
use crate::cache::{CacheStore, prune_snapshot, replace_json};

/// Source of pricing rows, sorted by `(wallet_code, fee, id)`
#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn load_all(&self) -> Result<Vec<ProviderPricing>, PricingError>;
}

pub struct PgPricingSource {
    pool: PgPool,
}

impl PgPricingSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingSource for PgPricingSource {
    async fn load_all(&self) -> Result<Vec<ProviderPricing>, PricingError> {
        let rows: Vec<ProviderPricing> = sqlx::query_as(
            r#"
            SELECT UPPER(pp.wallet_code) AS wallet_code,
                   p.code                AS provider_code,
                   p.name                AS provider_name,
                   pp.fee                AS fee
            FROM h2h_provider_pricing pp
            JOIN h2h_providers p ON p.id = pp.provider_id
            WHERE pp.status = 1 AND p.status = 1
            ORDER BY UPPER(pp.wallet_code), pp.fee ASC, pp.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Rebuilds the pricing index in the cache
pub struct PricingWarmer {
    source: Arc<dyn PricingSource>,
    cache: Arc<dyn CacheStore>,
    namespace: String,
}

impl PricingWarmer {
    pub fn new(source: Arc<dyn PricingSource>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            source,
            cache,
            namespace: PRICING_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Group rows by wallet code and replace each cache entry
    ///
    /// Row order inside a group is preserved, so the cheapest provider stays
    /// first. Returns the number of wallet codes written.
    pub async fn warm(&self) -> Result<usize, PricingError> {
        let rows = self.source.load_all().await?;

        let mut groups: BTreeMap<String, Vec<ProviderPricing>> = BTreeMap::new();
        for row in rows {
            groups
                .entry(row.wallet_code.to_uppercase())
                .or_default()
                .push(row);
        }

        let mut written = 0;
        for (wallet_code, providers) in &groups {
            match replace_json(
                self.cache.as_ref(),
                &self.namespace,
                wallet_code,
                providers,
                Duration::ZERO,
            )
            .await
            {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(wallet_code = %wallet_code, error = %e, "Failed to cache pricing")
                }
            }
        }

        let current: BTreeSet<String> = groups.keys().cloned().collect();
        let removed = prune_snapshot(self.cache.as_ref(), &self.namespace, &current).await?;

        info!(
            wallet_codes = groups.len(),
            written, removed, "Pricing cache warmed"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::pricing::PricingCacheReader;
    use rust_decimal::Decimal;

    struct StaticSource(Vec<ProviderPricing>);

    #[async_trait]
    impl PricingSource for StaticSource {
        async fn load_all(&self) -> Result<Vec<ProviderPricing>, PricingError> {
            Ok(self.0.clone())
        }
    }

    fn row(wallet: &str, provider: &str, fee: i64) -> ProviderPricing {
        ProviderPricing {
            wallet_code: wallet.to_string(),
            provider_code: provider.to_string(),
            provider_name: format!("{} name", provider),
            fee: Decimal::from(fee),
        }
    }

    #[tokio::test]
    async fn test_warm_groups_by_wallet_code() {
        let source = Arc::new(StaticSource(vec![
            row("LSAJA", "LSAJAH2H", 750),
            row("LSAJA", "PAYDAH2H", 750),
            row("lsaja", "TOPINH2H", 1000),
            row("DOMPET", "DOMPETH2H", 500),
        ]));
        let cache = Arc::new(MemoryCache::new());
        let warmer = PricingWarmer::new(source, cache.clone());

        assert_eq!(warmer.warm().await.unwrap(), 2);

        let reader = PricingCacheReader::new(cache);
        let lsaja = reader.lookup("LSAJA").await.unwrap();
        let codes: Vec<_> = lsaja.iter().map(|p| p.provider_code.as_str()).collect();
        // Tie on fee keeps source order
        assert_eq!(codes, vec!["LSAJAH2H", "PAYDAH2H", "TOPINH2H"]);

        assert_eq!(reader.lookup("dompet").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_warm_replaces_previous_snapshot() {
        let cache = Arc::new(MemoryCache::new());

        let first = PricingWarmer::new(
            Arc::new(StaticSource(vec![row("ISIK", "ISIKH2H", 900)])),
            cache.clone(),
        );
        first.warm().await.unwrap();

        let second = PricingWarmer::new(
            Arc::new(StaticSource(vec![row("ISIK", "DOMPETH2H", 100)])),
            cache.clone(),
        );
        second.warm().await.unwrap();

        let reader = PricingCacheReader::new(cache);
        let isik = reader.lookup("ISIK").await.unwrap();
        assert_eq!(isik.len(), 1);
        assert_eq!(isik[0].provider_code, "DOMPETH2H");
    }

    #[tokio::test]
    async fn test_wallet_code_without_rows_is_removed() {
        let cache = Arc::new(MemoryCache::new());

        PricingWarmer::new(
            Arc::new(StaticSource(vec![
                row("LSAJA", "LSAJAH2H", 500),
                row("DOMPET", "DOMPETH2H", 700),
            ])),
            cache.clone(),
        )
        .warm()
        .await
        .unwrap();

        PricingWarmer::new(
            Arc::new(StaticSource(vec![row("DOMPET", "DOMPETH2H", 700)])),
            cache.clone(),
        )
        .warm()
        .await
        .unwrap();

        let reader = PricingCacheReader::new(cache.clone());
        assert!(matches!(
            reader.lookup("LSAJA").await,
            Err(PricingError::NotFound(_))
        ));
        assert_eq!(reader.lookup("DOMPET").await.unwrap().len(), 1);

        // Empty source clears the namespace
        PricingWarmer::new(Arc::new(StaticSource(vec![])), cache.clone())
            .warm()
            .await
            .unwrap();
        assert!(matches!(
            reader.lookup("DOMPET").await,
            Err(PricingError::NotFound(_))
        ));
    }
}
