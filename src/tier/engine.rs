//! Tier engine
//!
//! `save` runs one read-decide-write cycle per qualifying transaction. The
//! decision itself ([`decide`]) is pure; the engine only gathers its inputs
//! (current row, schedule entry) and persists the result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::{
    BRONZE, ENTRY_GRADE, NOTE_ENROLLED, NOTE_PROMOTED, NOTE_RECURRING, Tier, TierJourney,
    TierSaveRequest,
};
use super::repository::TierRepository;
use super::schedule::{RewardScheduleCache, WfRewardTierProjection};
use super::{TierConfig, TierError};
use crate::error::TechnicalError;

/// What a `save` means for reward payout
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "projection")]
pub enum TierOutcome {
    NoReward,
    /// This transaction itself qualifies for the schedule's reward
    RewardEarned(WfRewardTierProjection),
    /// This transaction was the last step of the current tier
    AboutToPromote(WfRewardTierProjection),
}

impl TierOutcome {
    /// Nullable view: the projection when there is one
    pub fn projection(&self) -> Option<&WfRewardTierProjection> {
        match self {
            TierOutcome::NoReward => None,
            TierOutcome::RewardEarned(p) | TierOutcome::AboutToPromote(p) => Some(p),
        }
    }

    fn classify(recurring: i32, schedule: Option<&WfRewardTierProjection>) -> Self {
        match schedule {
            Some(p) if p.recurring == recurring => TierOutcome::RewardEarned(p.clone()),
            Some(p) if p.max_recurring == recurring => TierOutcome::AboutToPromote(p.clone()),
            _ => TierOutcome::NoReward,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Increment,
    Promote { grade: i32, tier: String },
}

/// Transition for an existing tier given the schedule entry for
/// `(current_tier, transaction_recurring)`
pub fn decide(tier: &Tier, schedule: Option<&WfRewardTierProjection>) -> (Transition, TierOutcome) {
    let n = tier.transaction_recurring;
    let outcome = TierOutcome::classify(n, schedule);

    let transition = match schedule {
        Some(p) if p.max_recurring == n => match p.next() {
            Some((grade, next)) => Transition::Promote {
                grade,
                tier: next.to_string(),
            },
            None => Transition::Increment,
        },
        _ => Transition::Increment,
    };

    (transition, outcome)
}

pub struct TierEngine {
    repository: Arc<dyn TierRepository>,
    schedule: RewardScheduleCache,
    config: TierConfig,
}

impl TierEngine {
    pub fn new(
        repository: Arc<dyn TierRepository>,
        schedule: RewardScheduleCache,
        config: TierConfig,
    ) -> Self {
        Self {
            repository,
            schedule,
            config,
        }
    }

    /// Create or advance the tier for `(partner_id, msisdn)`
    ///
    /// Retries the whole cycle when a concurrent writer wins, up to
    /// `max_attempts` times.
    pub async fn save(&self, req: &TierSaveRequest) -> Result<TierOutcome, TechnicalError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_save(req, Utc::now()).await {
                Ok(outcome) => return Ok(outcome),
                Err(TierError::Conflict(msg)) if attempt < max_attempts => {
                    warn!(
                        partner_id = req.partner_id,
                        attempt,
                        reason = %msg,
                        "Tier write conflict, retrying"
                    );
                }
                Err(e) => return Err(e.into_technical()),
            }
        }
    }

    async fn try_save(
        &self,
        req: &TierSaveRequest,
        now: DateTime<Utc>,
    ) -> Result<TierOutcome, TierError> {
        match self
            .repository
            .find_by_partner_msisdn(req.partner_id, &req.msisdn)
            .await?
        {
            None => self.enrol(req, now).await,
            Some(tier) => self.advance(tier, req, now).await,
        }
    }

    async fn enrol(&self, req: &TierSaveRequest, now: DateTime<Utc>) -> Result<TierOutcome, TierError> {
        let next = self
            .schedule
            .lookup(BRONZE, 1)
            .await
            .and_then(|p| p.next().map(|(g, t)| (g, t.to_string())));

        let tier = Tier {
            id: 0,
            partner_id: req.partner_id,
            msisdn: req.msisdn.clone(),
            email: req.email.clone(),
            current_grade: ENTRY_GRADE,
            current_tier: BRONZE.to_string(),
            prev_grade: None,
            prev_tier: None,
            next_grade: next.as_ref().map(|(g, _)| *g),
            next_tier: next.map(|(_, t)| t),
            transaction_recurring: 1,
            expired_date: now + self.config.expiry(),
            version: 0,
            journey: Vec::new(),
        };

        let journey = TierJourney::for_tier(
            &tier,
            Some(&req.transaction_id),
            NOTE_ENROLLED,
            &self.config.created_by,
        );
        let stored = self.repository.add(&tier, journey).await?;

        info!(
            tier_id = stored.id,
            partner_id = stored.partner_id,
            transaction_id = %req.transaction_id,
            "Tier enrolled"
        );
        Ok(TierOutcome::NoReward)
    }

    async fn advance(
        &self,
        current: Tier,
        req: &TierSaveRequest,
        now: DateTime<Utc>,
    ) -> Result<TierOutcome, TierError> {
        let schedule = self
            .schedule
            .lookup(&current.current_tier, current.transaction_recurring)
            .await;
        let (transition, outcome) = decide(&current, schedule.as_ref());

        let mut next = current.clone();
        if req.email.is_some() {
            next.email = req.email.clone();
        }

        let notes = match &transition {
            Transition::Increment => {
                next.transaction_recurring += 1;
                NOTE_RECURRING
            }
            Transition::Promote { grade, tier } => {
                next.prev_grade = Some(current.current_grade);
                next.prev_tier = Some(current.current_tier.clone());
                next.current_grade = *grade;
                next.current_tier = tier.clone();
                next.transaction_recurring = 1;
                next.expired_date = now + self.config.expiry();

                let upcoming = self
                    .schedule
                    .lookup(tier, 1)
                    .await
                    .and_then(|p| p.next().map(|(g, t)| (g, t.to_string())));
                next.next_grade = upcoming.as_ref().map(|(g, _)| *g);
                next.next_tier = upcoming.map(|(_, t)| t);
                NOTE_PROMOTED
            }
        };

        let journey = TierJourney::for_tier(
            &next,
            Some(&req.transaction_id),
            notes,
            &self.config.created_by,
        );
        let stored = self.repository.update(&next, journey).await?;

        match transition {
            Transition::Promote { .. } => info!(
                tier_id = stored.id,
                from = %current.current_tier,
                to = %stored.current_tier,
                transaction_id = %req.transaction_id,
                "Tier promoted"
            ),
            Transition::Increment => debug!(
                tier_id = stored.id,
                recurring = stored.transaction_recurring,
                "Tier recurring incremented"
            ),
        }

        Ok(outcome)
    }
}
