use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use httpmock::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

use kezbek::cache::{CacheStore, MemoryCache};
use kezbek::cashback::{BracketError, BracketRepository, CashbackBracket, CashbackRateResolver};
use kezbek::h2h::providers::linksaja::TOKEN_NAMESPACE;
use kezbek::h2h::{H2hConfig, H2hFactory};
use kezbek::lock::MemoryLockProvider;
use kezbek::payout::{CashbackPayout, PayoutRequest};
use kezbek::pricing::{PricingCacheReader, PricingError, PricingSource, PricingWarmer, ProviderPricing};
use kezbek::tier::{
    ExpirySweep, MemoryTierRepository, RewardScheduleCache, SweepOutcome, TierConfig, TierEngine,
    TierOutcome,
};

/// Brackets held in memory
struct Brackets(Vec<CashbackBracket>);

#[async_trait]
impl BracketRepository for Brackets {
    async fn find_matching(
        &self,
        qty: i32,
        amount: Decimal,
    ) -> Result<Vec<CashbackBracket>, BracketError> {
        Ok(self
            .0
            .iter()
            .filter(|b| b.contains(qty, amount))
            .cloned()
            .collect())
    }
}

/// Pricing rows as the warm query would return them
struct Pricing(Vec<ProviderPricing>);

#[async_trait]
impl PricingSource for Pricing {
    async fn load_all(&self) -> Result<Vec<ProviderPricing>, PricingError> {
        Ok(self.0.clone())
    }
}

fn pricing(wallet: &str, provider: &str, fee: i64) -> ProviderPricing {
    ProviderPricing {
        wallet_code: wallet.to_string(),
        provider_code: provider.to_string(),
        provider_name: provider.to_string(),
        fee: Decimal::from(fee),
    }
}

fn h2h_config(base_url: &str) -> H2hConfig {
    let yaml = format!(
        r#"
linksaja:
  base_url: "{base}"
  client_id: "kezbek"
  client_secret: "secret"
  transport: {{ timeout_ms: 2000, retry_count: 0, retry_delay_ms: 1 }}
payda:
  base_url: "{base}"
  api_key: "payda-key"
topin:
  base_url: "{base}"
  api_key: "topin-key"
dompet:
  base_url: "{base}"
  api_key: "dompet-key"
isik:
  base_url: "{base}"
  username: "kezbek"
  password: "pass"
"#,
        base = base_url
    );
    serde_yaml::from_str(&yaml).unwrap()
}

struct Harness {
    payout: CashbackPayout,
    cache: Arc<MemoryCache>,
    tiers: Arc<MemoryTierRepository>,
}

async fn harness(server: &MockServer) -> Harness {
    let cache = Arc::new(MemoryCache::new());

    // Cheapest first within each wallet code
    let warmed = PricingWarmer::new(
        Arc::new(Pricing(vec![
            pricing("LSAJA", "LSAJAH2H", 500),
            pricing("LSAJA", "PAYDAH2H", 900),
            pricing("DOMPET", "DOMPETH2H", 700),
        ])),
        cache.clone(),
    )
    .warm()
    .await
    .unwrap();
    assert_eq!(warmed, 2);

    let factory = H2hFactory::from_config(
        &h2h_config(&server.base_url()),
        PricingCacheReader::new(cache.clone()),
        cache.clone(),
    )
    .unwrap();

    let resolver = CashbackRateResolver::new(Arc::new(Brackets(vec![CashbackBracket {
        id: 1,
        min_qty: 1,
        max_qty: 5,
        min_transaction: Decimal::from(100),
        max_transaction: Decimal::from(1_000_000),
        percentage: Decimal::new(15, 1),
        status: 1,
    }])));

    let tiers = Arc::new(MemoryTierRepository::new());
    let engine = TierEngine::new(
        tiers.clone(),
        RewardScheduleCache::new(cache.clone()),
        TierConfig::default(),
    );

    Harness {
        payout: CashbackPayout::new(resolver, Arc::new(engine), Arc::new(factory)),
        cache,
        tiers,
    }
}

fn request(wallet: &str, ref_no: &str) -> PayoutRequest {
    PayoutRequest {
        partner_id: 1,
        msisdn: "628123".to_string(),
        email: Some("customer@example.com".to_string()),
        wallet_code: wallet.to_string(),
        qty: 3,
        amount: Decimal::from(1000),
        kezbek_ref_no: ref_no.to_string(),
    }
}

#[tokio::test]
async fn test_linksaja_payout_authorizes_once_and_caches_token() {
    let server = MockServer::start_async().await;
    let auth = server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .json_body(json!({"access_token": "tok-e2e", "expires_in": 3600}));
        })
        .await;
    let transfer = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/fund-transfer")
                .header("Authorization", "Bearer tok-e2e");
            then.status(200).json_body(json!({"confirmation_id": "LS-E2E"}));
        })
        .await;

    let h = harness(&server).await;

    let first = h.payout.process(&request("lsaja", "KZB-E2E-1")).await.unwrap();
    let second = h.payout.process(&request("LSAJA", "KZB-E2E-2")).await.unwrap();

    assert_eq!(first.cashback.amount, Decimal::new(1500, 2));
    assert_eq!(first.receipt.host_code, "LSAJAH2H");
    assert_eq!(first.receipt.transaction_id, "LS-E2E");
    assert_eq!(first.tier, TierOutcome::NoReward);
    assert_eq!(second.receipt.host_code, "LSAJAH2H");

    auth.assert_hits_async(1).await;
    transfer.assert_hits_async(2).await;
    assert_eq!(h.cache.get(TOKEN_NAMESPACE, "LSAJAH2H").await.unwrap(), "tok-e2e");

    let tier = &h.tiers.tiers()[0];
    assert_eq!(tier.transaction_recurring, 2);
    assert_eq!(h.tiers.journeys().len(), 2);
}

#[tokio::test]
async fn test_unknown_wallet_is_rejected_without_provider_call() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({}));
        })
        .await;

    let h = harness(&server).await;
    let err = h.payout.process(&request("OVO", "KZB-E2E-3")).await.unwrap_err();

    assert_eq!(err.code(), "MERCHANT_CODE_INVALID");
    assert_eq!(err.http_status(), 400);
    any.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_provider_error_maps_to_business_code() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/wallet/transfer");
            then.status(400).body("invalid destination");
        })
        .await;

    let h = harness(&server).await;
    let err = h.payout.process(&request("dompet", "KZB-E2E-4")).await.unwrap_err();

    assert_eq!(err.code(), "H2H_CASHBACK_FAILED");
}

#[tokio::test]
async fn test_expiry_sweep_after_promotion_window() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/wallet/transfer");
            then.status(200).json_body(json!({"transaction_ref": "DMP-1"}));
        })
        .await;

    let h = harness(&server).await;
    h.payout.process(&request("DOMPET", "KZB-E2E-5")).await.unwrap();

    let sweep = ExpirySweep::new(
        h.tiers.clone(),
        Arc::new(MemoryLockProvider::new()),
        TierConfig::default(),
    );

    assert_eq!(
        sweep.run_once(Utc::now()).await.unwrap(),
        SweepOutcome::NothingExpired
    );

    let later = Utc::now() + chrono::Duration::days(31);
    assert_eq!(sweep.run_once(later).await.unwrap(), SweepOutcome::Expired(1));

    let tier = &h.tiers.tiers()[0];
    assert_eq!(tier.current_tier, "BRONZE");
    assert_eq!(tier.transaction_recurring, 1);
    assert!(tier.expired_date > later);

    // Sweep leaves the caches alone
    assert!(!h.cache.is_empty());
}

#[tokio::test]
async fn test_rewarm_without_wallet_code_stops_routing() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({}));
        })
        .await;

    let h = harness(&server).await;

    PricingWarmer::new(
        Arc::new(Pricing(vec![pricing("DOMPET", "DOMPETH2H", 700)])),
        h.cache.clone(),
    )
    .warm()
    .await
    .unwrap();

    let err = h.payout.process(&request("LSAJA", "KZB-E2E-6")).await.unwrap_err();

    assert_eq!(err.code(), "MERCHANT_CODE_INVALID");
    any.assert_hits_async(0).await;
}
