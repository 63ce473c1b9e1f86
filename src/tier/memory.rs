//! In-process tier repository
//!
//! Same contract as the PostgreSQL repository, including the version check.
//! Used for local runs without a database and in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::TierError;
use super::models::{NOTE_EXPIRED, Tier, TierJourney};
use super::repository::TierRepository;

#[derive(Default)]
struct State {
    tiers: Vec<Tier>,
    journeys: Vec<TierJourney>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryTierRepository {
    state: Mutex<State>,
    /// Updates still to reject with a conflict
    pending_conflicts: AtomicUsize,
}

impl MemoryTierRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` updates as if a concurrent writer had won
    pub fn fail_next_updates(&self, n: usize) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Store a tier as-is, without a journey row
    pub fn seed(&self, mut tier: Tier) -> Tier {
        let mut state = self.lock();
        state.next_id += 1;
        tier.id = state.next_id;
        tier.version = tier.version.max(1);
        state.tiers.push(tier.clone());
        tier
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.lock().tiers.clone()
    }

    pub fn journeys(&self) -> Vec<TierJourney> {
        self.lock().journeys.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-write
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TierRepository for MemoryTierRepository {
    async fn find_by_partner_msisdn(
        &self,
        partner_id: i64,
        msisdn: &str,
    ) -> Result<Option<Tier>, TierError> {
        Ok(self
            .lock()
            .tiers
            .iter()
            .find(|t| t.partner_id == partner_id && t.msisdn == msisdn)
            .cloned())
    }

    async fn add(&self, tier: &Tier, mut journey: TierJourney) -> Result<Tier, TierError> {
        let mut state = self.lock();
        if state
            .tiers
            .iter()
            .any(|t| t.partner_id == tier.partner_id && t.msisdn == tier.msisdn)
        {
            return Err(TierError::Conflict(format!(
                "tier for partner {} already exists",
                tier.partner_id
            )));
        }

        state.next_id += 1;
        let id = state.next_id;
        journey.tier_id = id;

        let stored = Tier {
            id,
            version: 1,
            journey: vec![journey.clone()],
            ..tier.clone()
        };
        state.tiers.push(Tier {
            journey: Vec::new(),
            ..stored.clone()
        });
        state.journeys.push(journey);
        Ok(stored)
    }

    async fn update(&self, tier: &Tier, mut journey: TierJourney) -> Result<Tier, TierError> {
        if self.take_conflict() {
            return Err(TierError::Conflict(format!("tier {} (injected)", tier.id)));
        }

        let mut state = self.lock();
        let Some(slot) = state.tiers.iter_mut().find(|t| t.id == tier.id) else {
            return Err(TierError::Conflict(format!("tier {} not found", tier.id)));
        };
        if slot.version != tier.version {
            return Err(TierError::Conflict(format!(
                "tier {} is no longer at version {}",
                tier.id, tier.version
            )));
        }

        let email = tier.email.clone().or_else(|| slot.email.clone());
        *slot = Tier {
            email,
            version: tier.version + 1,
            journey: Vec::new(),
            ..tier.clone()
        };
        let stored = slot.clone();

        journey.tier_id = tier.id;
        state.journeys.push(journey.clone());

        Ok(Tier {
            journey: vec![journey],
            ..stored
        })
    }

    async fn count_expire(&self, cutoff: DateTime<Utc>) -> Result<i64, TierError> {
        Ok(self
            .lock()
            .tiers
            .iter()
            .filter(|t| t.expired_date <= cutoff)
            .count() as i64)
    }

    async fn expire(
        &self,
        cutoff: DateTime<Utc>,
        new_expired_date: DateTime<Utc>,
        created_by: &str,
    ) -> Result<u64, TierError> {
        let mut state = self.lock();
        let mut written = Vec::new();

        for tier in state.tiers.iter_mut().filter(|t| t.expired_date <= cutoff) {
            let (old_grade, old_tier) = (tier.current_grade, tier.current_tier.clone());
            tier.current_grade = tier.prev_grade.unwrap_or(old_grade);
            tier.current_tier = tier.prev_tier.clone().unwrap_or_else(|| old_tier.clone());
            tier.prev_grade = Some(old_grade);
            tier.prev_tier = Some(old_tier);
            tier.transaction_recurring = 1;
            tier.expired_date = new_expired_date;
            tier.version += 1;

            written.push(TierJourney::for_tier(tier, None, NOTE_EXPIRED, created_by));
        }

        let demoted = written.len() as u64;
        state.journeys.extend(written);
        Ok(demoted)
    }
}
