//! Loyalty Tier State Machine
//!
//! Per `(partner_id, msisdn)`:
//!
//! ```text
//!                 save (no row)
//! NotEnrolled ─────────────────────> Active(BRONZE, 1, recurring=1)
//!
//!                 save, no promotion
//! Active(t, g, n) ─────────────────> Active(t, g, n+1)
//!
//!                 save, schedule(t, n).max_recurring == n
//!                       and next_tier present
//! Active(t, g, n) ─────────────────> Active(next, next_grade, 1)
//!
//!                 sweep, expired_date <= cutoff
//! Active(t, g, n) ─────────────────> Active(prev, prev_grade, 1)
//! ```
//!
//! Every transition writes exactly one journey row in the same database
//! transaction as the tier row.

pub mod engine;
pub mod memory;
pub mod models;
pub mod repository;
pub mod schedule;
pub mod sweep;

pub use engine::{TierEngine, TierOutcome};
pub use memory::MemoryTierRepository;
pub use models::{Tier, TierJourney, TierSaveRequest};
pub use repository::{PgTierRepository, TierRepository};
pub use schedule::{RewardScheduleCache, RewardScheduleWarmer, WfRewardTierProjection};
pub use sweep::{ExpirySweep, SweepOutcome};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::error::TechnicalError;

#[derive(Error, Debug)]
pub enum TierError {
    /// Concurrent writer won; nothing was persisted and the cycle may be retried
    #[error("Concurrent tier update: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Commit failed after the statements executed; already logged as fatal
    #[error("{0}")]
    Fatal(TechnicalError),
}

impl TierError {
    /// Classify a database error raised inside a tier transaction
    pub fn from_db(e: sqlx::Error) -> Self {
        if is_retryable_db_error(&e) {
            TierError::Conflict(e.to_string())
        } else {
            TierError::Database(e)
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, TierError::Conflict(_))
    }

    /// Convert for the use-case boundary, logging unless already logged
    pub fn into_technical(self) -> TechnicalError {
        match self {
            TierError::Fatal(e) => e,
            other => TechnicalError::new(other.to_string()),
        }
    }
}

/// Serialization failure (40001) or unique violation (23505)
fn is_retryable_db_error(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == "40001" || code == "23505")
}

/// Tier engine and sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Days until a freshly entered tier expires
    #[serde(default = "default_expiry_days")]
    pub expiry_days: i64,
    /// Written to `created_by` of every journey row
    #[serde(default = "default_created_by")]
    pub created_by: String,
    /// Attempts of the read-decide-write cycle on conflict
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_expiry_days() -> i64 {
    30
}

fn default_created_by() -> String {
    "SYSTEM".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            expiry_days: default_expiry_days(),
            created_by: default_created_by(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl TierConfig {
    pub fn expiry(&self) -> Duration {
        Duration::days(self.expiry_days)
    }
}
