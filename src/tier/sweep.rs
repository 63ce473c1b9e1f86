//! Tier expiry sweep
//!
//! Batch demotion of expired tiers. Runs under a cluster-wide mutex; the
//! replica that loses the race skips the tick.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::TierConfig;
use super::repository::TierRepository;
use crate::error::TechnicalError;
use crate::lock::LockProvider;

pub const SWEEP_LOCK_NAME: &str = "kezbek:tier-expiry-sweep";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another replica holds the lock
    Skipped,
    NothingExpired,
    Expired(u64),
}

pub struct ExpirySweep {
    repository: Arc<dyn TierRepository>,
    locks: Arc<dyn LockProvider>,
    config: TierConfig,
}

impl ExpirySweep {
    pub fn new(
        repository: Arc<dyn TierRepository>,
        locks: Arc<dyn LockProvider>,
        config: TierConfig,
    ) -> Self {
        Self {
            repository,
            locks,
            config,
        }
    }

    /// One tick: lock, sweep, unlock
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepOutcome, TechnicalError> {
        let mut mutex = self.locks.new_mutex(SWEEP_LOCK_NAME);
        if let Err(e) = mutex.lock().await {
            warn!(lock = mutex.name(), error = %e, "Expiry sweep lock not acquired, skipping tick");
            return Ok(SweepOutcome::Skipped);
        }

        let result = self.sweep(now).await;

        match mutex.unlock().await {
            Ok(true) => {}
            Ok(false) => warn!(lock = mutex.name(), "Expiry sweep lock lost before unlock"),
            Err(e) => warn!(lock = mutex.name(), error = %e, "Expiry sweep unlock failed"),
        }

        result
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepOutcome, TechnicalError> {
        let count = self
            .repository
            .count_expire(now)
            .await
            .map_err(|e| e.into_technical())?;

        if count == 0 {
            debug!("No expired tiers");
            return Ok(SweepOutcome::NothingExpired);
        }

        let new_expired_date = now + self.config.expiry();
        let demoted = self
            .repository
            .expire(now, new_expired_date, &self.config.created_by)
            .await
            .map_err(|e| e.into_technical())?;

        info!(
            expected = count,
            demoted,
            new_expired_date = %new_expired_date,
            "Expired tiers demoted"
        );
        Ok(SweepOutcome::Expired(demoted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryLockProvider;
    use crate::tier::memory::MemoryTierRepository;
    use crate::tier::models::{BRONZE, GOLD, NOTE_EXPIRED, SILVER, Tier};
    use chrono::Duration;

    fn tier(msisdn: &str, current: (i32, &str), prev: Option<(i32, &str)>, expired: DateTime<Utc>) -> Tier {
        Tier {
            id: 0,
            partner_id: 1,
            msisdn: msisdn.to_string(),
            email: None,
            current_grade: current.0,
            current_tier: current.1.to_string(),
            prev_grade: prev.map(|p| p.0),
            prev_tier: prev.map(|p| p.1.to_string()),
            next_grade: None,
            next_tier: None,
            transaction_recurring: 4,
            expired_date: expired,
            version: 1,
            journey: Vec::new(),
        }
    }

    fn sweep(repo: Arc<MemoryTierRepository>, locks: Arc<MemoryLockProvider>) -> ExpirySweep {
        ExpirySweep::new(repo, locks, TierConfig::default())
    }

    #[tokio::test]
    async fn test_expired_tiers_are_demoted_uniformly() {
        let now = Utc::now();
        let repo = Arc::new(MemoryTierRepository::new());
        repo.seed(tier("a", (3, GOLD), Some((2, SILVER)), now - Duration::days(3)));
        repo.seed(tier("b", (2, SILVER), Some((1, BRONZE)), now - Duration::hours(1)));
        repo.seed(tier("c", (2, SILVER), Some((1, BRONZE)), now + Duration::days(1)));
        let locks = Arc::new(MemoryLockProvider::new());

        let outcome = sweep(repo.clone(), locks.clone()).run_once(now).await.unwrap();
        assert_eq!(outcome, SweepOutcome::Expired(2));

        let tiers = repo.tiers();
        let a = tiers.iter().find(|t| t.msisdn == "a").unwrap();
        let b = tiers.iter().find(|t| t.msisdn == "b").unwrap();
        let c = tiers.iter().find(|t| t.msisdn == "c").unwrap();

        assert_eq!((a.current_grade, a.current_tier.as_str()), (2, SILVER));
        assert_eq!(a.prev_tier.as_deref(), Some(GOLD));
        assert_eq!(a.transaction_recurring, 1);
        assert_eq!((b.current_grade, b.current_tier.as_str()), (1, BRONZE));
        assert_eq!(b.prev_tier.as_deref(), Some(SILVER));
        assert_eq!(a.expired_date, b.expired_date);
        assert_eq!(a.expired_date, now + Duration::days(30));

        assert_eq!(c.current_tier, SILVER);
        assert_eq!(c.transaction_recurring, 4);

        let journeys = repo.journeys();
        assert_eq!(journeys.len(), 2);
        assert!(journeys.iter().all(|j| j.notes == NOTE_EXPIRED && j.last_transaction_id.is_none()));

        assert!(!locks.is_held(SWEEP_LOCK_NAME));
    }

    #[tokio::test]
    async fn test_nothing_expired_skips_write() {
        let now = Utc::now();
        let repo = Arc::new(MemoryTierRepository::new());
        repo.seed(tier("a", (2, SILVER), Some((1, BRONZE)), now + Duration::days(1)));

        let outcome = sweep(repo.clone(), Arc::new(MemoryLockProvider::new()))
            .run_once(now)
            .await
            .unwrap();

        assert_eq!(outcome, SweepOutcome::NothingExpired);
        assert_eq!(repo.tiers()[0].version, 1);
    }

    #[tokio::test]
    async fn test_held_lock_skips_tick() {
        let now = Utc::now();
        let repo = Arc::new(MemoryTierRepository::new());
        repo.seed(tier("a", (2, SILVER), Some((1, BRONZE)), now - Duration::days(1)));
        let locks = Arc::new(MemoryLockProvider::new());

        let mut other = locks.new_mutex(SWEEP_LOCK_NAME);
        other.lock().await.unwrap();

        let outcome = sweep(repo.clone(), locks.clone()).run_once(now).await.unwrap();

        assert_eq!(outcome, SweepOutcome::Skipped);
        assert_eq!(repo.tiers()[0].current_tier, SILVER);
        assert!(locks.is_held(SWEEP_LOCK_NAME));
    }

    #[tokio::test]
    async fn test_tier_without_prev_keeps_current() {
        let now = Utc::now();
        let repo = Arc::new(MemoryTierRepository::new());
        repo.seed(tier("a", (1, BRONZE), None, now - Duration::days(1)));

        sweep(repo.clone(), Arc::new(MemoryLockProvider::new()))
            .run_once(now)
            .await
            .unwrap();

        let after = &repo.tiers()[0];
        assert_eq!(after.current_tier, BRONZE);
        assert_eq!(after.transaction_recurring, 1);
        assert!(after.expired_date > now);
    }
}
