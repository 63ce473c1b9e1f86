//! Reward schedule
//!
//! Reference data keyed by `(tier, recurring)`, cached as
//! `wf_reward_tier:{TIER}_{RECURRING}`. The engine reads it fail-open: any
//! miss or error behaves like "no schedule entry". A warm removes entries
//! whose rows were deleted.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::TierError;
use crate::cache::{CacheError, CacheStore, get_json, prune_snapshot, replace_json};

pub const SCHEDULE_NAMESPACE: &str = "wf_reward_tier";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRef {
    pub grade: Option<i32>,
    pub tier: Option<String>,
}

impl TierRef {
    /// Both grade and tier present
    pub fn resolved(&self) -> Option<(i32, &str)> {
        match (self.grade, self.tier.as_deref()) {
            (Some(g), Some(t)) => Some((g, t)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WfRewardTierProjection {
    pub tier: String,
    pub grade: i32,
    pub recurring: i32,
    pub max_recurring: i32,
    pub reward: Decimal,
    #[serde(default)]
    pub prev_tier: Option<TierRef>,
    #[serde(default)]
    pub next_tier: Option<TierRef>,
}

impl WfRewardTierProjection {
    pub fn next(&self) -> Option<(i32, &str)> {
        self.next_tier.as_ref().and_then(TierRef::resolved)
    }
}

/// Cache field for a schedule entry
pub fn schedule_field(tier: &str, recurring: i32) -> String {
    format!("{}_{}", tier.trim().to_uppercase(), recurring)
}

/// Fail-open reader over the cached schedule
#[derive(Clone)]
pub struct RewardScheduleCache {
    cache: Arc<dyn CacheStore>,
    namespace: String,
}

impl RewardScheduleCache {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self::with_namespace(cache, SCHEDULE_NAMESPACE)
    }

    pub fn with_namespace(cache: Arc<dyn CacheStore>, namespace: impl Into<String>) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
        }
    }

    pub async fn lookup(&self, tier: &str, recurring: i32) -> Option<WfRewardTierProjection> {
        let field = schedule_field(tier, recurring);
        match get_json(self.cache.as_ref(), &self.namespace, &field).await {
            Ok(p) => Some(p),
            Err(CacheError::NotFound(_)) => {
                debug!(key = %field, "Reward schedule miss");
                None
            }
            Err(e) => {
                warn!(key = %field, error = %e, "Reward schedule read failed, treating as miss");
                None
            }
        }
    }
}

#[async_trait]
pub trait RewardScheduleSource: Send + Sync {
    async fn load_all(&self) -> Result<Vec<WfRewardTierProjection>, TierError>;
}

#[derive(FromRow)]
struct ScheduleRow {
    tier: String,
    grade: i32,
    recurring: i32,
    max_recurring: i32,
    reward: Decimal,
    prev_grade: Option<i32>,
    prev_tier: Option<String>,
    next_grade: Option<i32>,
    next_tier: Option<String>,
}

fn tier_ref(grade: Option<i32>, tier: Option<String>) -> Option<TierRef> {
    if grade.is_none() && tier.is_none() {
        None
    } else {
        Some(TierRef { grade, tier })
    }
}

impl From<ScheduleRow> for WfRewardTierProjection {
    fn from(row: ScheduleRow) -> Self {
        Self {
            tier: row.tier,
            grade: row.grade,
            recurring: row.recurring,
            max_recurring: row.max_recurring,
            reward: row.reward,
            prev_tier: tier_ref(row.prev_grade, row.prev_tier),
            next_tier: tier_ref(row.next_grade, row.next_tier),
        }
    }
}

pub struct PgRewardScheduleSource {
    pool: PgPool,
}

impl PgRewardScheduleSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RewardScheduleSource for PgRewardScheduleSource {
    async fn load_all(&self) -> Result<Vec<WfRewardTierProjection>, TierError> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(
            r#"
            SELECT UPPER(tier) AS tier, grade, recurring, max_recurring, reward,
                   prev_grade, UPPER(prev_tier) AS prev_tier,
                   next_grade, UPPER(next_tier) AS next_tier
            FROM wf_reward_tiers
            WHERE status = 1
            ORDER BY grade, recurring
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Rewrites one cache entry per `(tier, recurring)`
pub struct RewardScheduleWarmer {
    source: Arc<dyn RewardScheduleSource>,
    cache: Arc<dyn CacheStore>,
    namespace: String,
}

impl RewardScheduleWarmer {
    pub fn new(source: Arc<dyn RewardScheduleSource>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            source,
            cache,
            namespace: SCHEDULE_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub async fn warm(&self) -> Result<usize, TierError> {
        let entries = self.source.load_all().await?;

        let mut current = BTreeSet::new();
        for entry in &entries {
            let field = schedule_field(&entry.tier, entry.recurring);
            replace_json(self.cache.as_ref(), &self.namespace, &field, entry, Duration::ZERO)
                .await?;
            current.insert(field);
        }
        let removed = prune_snapshot(self.cache.as_ref(), &self.namespace, &current).await?;

        info!(entries = entries.len(), removed, "Reward schedule cache warmed");
        Ok(entries.len())
    }
}
