//! Tier storage
//!
//! Every write runs in its own SERIALIZABLE transaction and commits the tier
//! row together with its journey row(s). Dropping a `Transaction` without
//! committing rolls it back, so early returns never leave partial writes.
//!
//! Updates are guarded by `version`; a stale version or a serialization
//! failure is reported as [`TierError::Conflict`] and nothing is persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::TierError;
use super::models::{NOTE_EXPIRED, Tier, TierJourney};
use crate::db;
use crate::error::TechnicalError;

#[async_trait]
pub trait TierRepository: Send + Sync {
    async fn find_by_partner_msisdn(
        &self,
        partner_id: i64,
        msisdn: &str,
    ) -> Result<Option<Tier>, TierError>;

    /// Insert a new tier and its journey row; returns the stored tier
    async fn add(&self, tier: &Tier, journey: TierJourney) -> Result<Tier, TierError>;

    /// Write `tier` if its `version` is still current; returns the stored
    /// tier with the bumped version
    async fn update(&self, tier: &Tier, journey: TierJourney) -> Result<Tier, TierError>;

    /// Tiers with `expired_date <= cutoff`
    async fn count_expire(&self, cutoff: DateTime<Utc>) -> Result<i64, TierError>;

    /// Demote every tier with `expired_date <= cutoff`: swap current and
    /// previous, reset recurring to 1, set `new_expired_date`, and write one
    /// journey row each. Returns the number of demoted tiers.
    async fn expire(
        &self,
        cutoff: DateTime<Utc>,
        new_expired_date: DateTime<Utc>,
        created_by: &str,
    ) -> Result<u64, TierError>;
}

pub struct PgTierRepository {
    pool: PgPool,
}

impl PgTierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, TierError> {
        db::begin_serializable(&self.pool)
            .await
            .map_err(TierError::from_db)
    }

    /// Commit, treating anything but a serialization failure as fatal
    async fn commit(tx: Transaction<'static, Postgres>, what: &str) -> Result<(), TierError> {
        match tx.commit().await {
            Ok(()) => Ok(()),
            Err(e) => match TierError::from_db(e) {
                TierError::Conflict(msg) => Err(TierError::Conflict(msg)),
                other => Err(TierError::Fatal(TechnicalError::fatal(format!(
                    "commit {} failed: {}",
                    what, other
                )))),
            },
        }
    }

    async fn insert_journey(
        tx: &mut Transaction<'static, Postgres>,
        journey: &TierJourney,
    ) -> Result<(), TierError> {
        sqlx::query(
            r#"
            INSERT INTO tier_journeys
                (tier_id, last_transaction_id, current_grade, current_tier, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(journey.tier_id)
        .bind(&journey.last_transaction_id)
        .bind(journey.current_grade)
        .bind(&journey.current_tier)
        .bind(&journey.notes)
        .bind(&journey.created_by)
        .execute(&mut **tx)
        .await
        .map_err(TierError::from_db)?;

        Ok(())
    }
}

#[async_trait]
impl TierRepository for PgTierRepository {
    async fn find_by_partner_msisdn(
        &self,
        partner_id: i64,
        msisdn: &str,
    ) -> Result<Option<Tier>, TierError> {
        let tier: Option<Tier> = sqlx::query_as(
            r#"
            SELECT id, partner_id, msisdn, email, current_grade, current_tier,
                   prev_grade, prev_tier, next_grade, next_tier,
                   transaction_recurring, expired_date, version
            FROM tiers
            WHERE partner_id = $1 AND msisdn = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(partner_id)
        .bind(msisdn)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tier)
    }

    async fn add(&self, tier: &Tier, mut journey: TierJourney) -> Result<Tier, TierError> {
        let mut tx = self.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tiers
                (partner_id, msisdn, email, current_grade, current_tier,
                 prev_grade, prev_tier, next_grade, next_tier,
                 transaction_recurring, expired_date, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1)
            RETURNING id
            "#,
        )
        .bind(tier.partner_id)
        .bind(&tier.msisdn)
        .bind(&tier.email)
        .bind(tier.current_grade)
        .bind(&tier.current_tier)
        .bind(tier.prev_grade)
        .bind(&tier.prev_tier)
        .bind(tier.next_grade)
        .bind(&tier.next_tier)
        .bind(tier.transaction_recurring)
        .bind(tier.expired_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(TierError::from_db)?;

        journey.tier_id = id;
        Self::insert_journey(&mut tx, &journey).await?;
        Self::commit(tx, "tier insert").await?;

        debug!(tier_id = id, partner_id = tier.partner_id, "Tier inserted");
        Ok(Tier {
            id,
            version: 1,
            journey: vec![journey],
            ..tier.clone()
        })
    }

    async fn update(&self, tier: &Tier, mut journey: TierJourney) -> Result<Tier, TierError> {
        let mut tx = self.begin().await?;

        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE tiers
            SET email = COALESCE($3, email),
                current_grade = $4, current_tier = $5,
                prev_grade = $6, prev_tier = $7,
                next_grade = $8, next_tier = $9,
                transaction_recurring = $10, expired_date = $11,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2 AND deleted_at IS NULL
            RETURNING version
            "#,
        )
        .bind(tier.id)
        .bind(tier.version)
        .bind(&tier.email)
        .bind(tier.current_grade)
        .bind(&tier.current_tier)
        .bind(tier.prev_grade)
        .bind(&tier.prev_tier)
        .bind(tier.next_grade)
        .bind(&tier.next_tier)
        .bind(tier.transaction_recurring)
        .bind(tier.expired_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(TierError::from_db)?;

        let Some(version) = version else {
            tx.rollback().await?;
            return Err(TierError::Conflict(format!(
                "tier {} is no longer at version {}",
                tier.id, tier.version
            )));
        };

        journey.tier_id = tier.id;
        Self::insert_journey(&mut tx, &journey).await?;
        Self::commit(tx, "tier update").await?;

        Ok(Tier {
            version,
            journey: vec![journey],
            ..tier.clone()
        })
    }

    async fn count_expire(&self, cutoff: DateTime<Utc>) -> Result<i64, TierError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tiers WHERE expired_date <= $1 AND deleted_at IS NULL",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn expire(
        &self,
        cutoff: DateTime<Utc>,
        new_expired_date: DateTime<Utc>,
        created_by: &str,
    ) -> Result<u64, TierError> {
        let mut tx = self.begin().await?;

        // Journey rows first, from the pre-update values
        sqlx::query(
            r#"
            INSERT INTO tier_journeys
                (tier_id, last_transaction_id, current_grade, current_tier, notes, created_by)
            SELECT id, NULL,
                   COALESCE(prev_grade, current_grade),
                   COALESCE(prev_tier, current_tier),
                   $2, $3
            FROM tiers
            WHERE expired_date <= $1 AND deleted_at IS NULL
            "#,
        )
        .bind(cutoff)
        .bind(NOTE_EXPIRED)
        .bind(created_by)
        .execute(&mut *tx)
        .await
        .map_err(TierError::from_db)?;

        // SET expressions see the old row, so this is a swap
        let result = sqlx::query(
            r#"
            UPDATE tiers
            SET current_grade = COALESCE(prev_grade, current_grade),
                current_tier = COALESCE(prev_tier, current_tier),
                prev_grade = current_grade,
                prev_tier = current_tier,
                transaction_recurring = 1,
                expired_date = $2,
                version = version + 1,
                updated_at = NOW()
            WHERE expired_date <= $1 AND deleted_at IS NULL
            "#,
        )
        .bind(cutoff)
        .bind(new_expired_date)
        .execute(&mut *tx)
        .await
        .map_err(TierError::from_db)?;

        Self::commit(tx, "tier expiry").await?;
        Ok(result.rows_affected())
    }
}
