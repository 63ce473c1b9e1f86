//! Kezbek - Cashback Engine
//!
//! Process entry point. Wires the stores and starts the periodic jobs:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌────────────────────────┐
//! │  Config  │───▶│ Postgres │───▶│ Scheduler              │
//! │  (YAML)  │    │  Redis   │    │  - tier expiry sweep   │
//! └──────────┘    └──────────┘    │  - pricing cache warm  │
//!                                 │  - schedule cache warm │
//!                                 └────────────────────────┘
//! ```

use anyhow::Context;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use kezbek::cache::RedisCache;
use kezbek::config::AppConfig;
use kezbek::db::Database;
use kezbek::h2h::H2hFactory;
use kezbek::lock::RedisLockProvider;
use kezbek::logging::init_logging;
use kezbek::pricing::{PgPricingSource, PricingCacheReader, PricingWarmer};
use kezbek::scheduler::Scheduler;
use kezbek::tier::schedule::PgRewardScheduleSource;
use kezbek::tier::{ExpirySweep, PgTierRepository, RewardScheduleWarmer};

// ============================================================
// ARGS
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);

    info!(env = %env, git = env!("KEZBEK_GIT_HASH"), "Starting kezbek");

    let db = Database::connect(&config.postgres_url)
        .await
        .context("connect PostgreSQL")?;
    db.health_check().await.context("PostgreSQL health check")?;

    let redis = RedisCache::connect(&config.redis_url)
        .await
        .context("connect Redis")?;
    let locks = Arc::new(RedisLockProvider::new(
        redis.connection(),
        config.lock.clone(),
    ));
    let cache = Arc::new(redis);

    // Fails fast on a broken provider section
    let factory = H2hFactory::from_config(
        &config.h2h,
        PricingCacheReader::with_namespace(cache.clone(), &config.cache.pricing_namespace),
        cache.clone(),
    )
    .context("build H2H providers")?;
    info!(providers = ?factory.provider_codes(), "H2H providers registered");

    let pool = db.pool().clone();
    let pricing = PricingWarmer::new(Arc::new(PgPricingSource::new(pool.clone())), cache.clone())
        .with_namespace(&config.cache.pricing_namespace);
    let schedule = RewardScheduleWarmer::new(
        Arc::new(PgRewardScheduleSource::new(pool.clone())),
        cache.clone(),
    )
    .with_namespace(&config.cache.schedule_namespace);
    let sweep = ExpirySweep::new(
        Arc::new(PgTierRepository::new(pool)),
        locks,
        config.tier.clone(),
    );

    let scheduler = Arc::new(Scheduler::new(
        Arc::new(sweep),
        Arc::new(pricing),
        Arc::new(schedule),
        config.scheduler.clone(),
    ));

    let worker = scheduler.clone();
    let handle: JoinHandle<()> = tokio::spawn(async move {
        worker.run().await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("wait for shutdown signal")?;
    info!("Shutdown signal received");

    handle.abort();
    if let Err(e) = handle.await {
        if !e.is_cancelled() {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }

    Ok(())
}
