//! Periodic jobs
//!
//! One task drives both the tier expiry sweep and the cache warmers. Every
//! replica runs it; the sweep lock keeps demotion single-writer, while cache
//! warms are idempotent and may overlap.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::pricing::PricingWarmer;
use crate::tier::{ExpirySweep, RewardScheduleWarmer, SweepOutcome};

/// Entries written by one warm pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub wallet_codes: usize,
    pub schedule_entries: usize,
}

pub struct Scheduler {
    sweep: Arc<ExpirySweep>,
    pricing: Arc<PricingWarmer>,
    schedule: Arc<RewardScheduleWarmer>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        sweep: Arc<ExpirySweep>,
        pricing: Arc<PricingWarmer>,
        schedule: Arc<RewardScheduleWarmer>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            sweep,
            pricing,
            schedule,
            config,
        }
    }

    /// Run both jobs forever; the first ticks fire immediately
    pub async fn run(&self) -> ! {
        info!(
            sweep_interval_secs = self.config.sweep_interval_secs,
            warm_interval_secs = self.config.warm_interval_secs,
            "Starting scheduler"
        );

        let mut sweep_tick = interval(Duration::from_secs(self.config.sweep_interval_secs.max(1)));
        let mut warm_tick = interval(Duration::from_secs(self.config.warm_interval_secs.max(1)));
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        warm_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = sweep_tick.tick() => {
                    self.sweep_once().await;
                }
                _ = warm_tick.tick() => {
                    self.warm_once().await;
                }
            }
        }
    }

    /// One sweep tick; failures are logged, never propagated
    pub async fn sweep_once(&self) -> Option<SweepOutcome> {
        match self.sweep.run_once(Utc::now()).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(ticket = %e.ticket, "Expiry sweep failed");
                None
            }
        }
    }

    /// Rewrite both caches; a failing warmer does not stop the other
    pub async fn warm_once(&self) -> WarmReport {
        let mut report = WarmReport::default();

        match self.pricing.warm().await {
            Ok(n) => report.wallet_codes = n,
            Err(e) => error!(error = %e, "Pricing cache warm failed"),
        }
        match self.schedule.warm().await {
            Ok(n) => report.schedule_entries = n,
            Err(e) => error!(error = %e, "Reward schedule cache warm failed"),
        }

        report
    }
}
