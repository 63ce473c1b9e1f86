//! Tier rows and requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const BRONZE: &str = "BRONZE";
pub const SILVER: &str = "SILVER";
pub const GOLD: &str = "GOLD";

/// Grade of the entry tier
pub const ENTRY_GRADE: i32 = 1;

// Journey notes
pub const NOTE_ENROLLED: &str = "ENROLLED";
pub const NOTE_RECURRING: &str = "RECURRING";
pub const NOTE_PROMOTED: &str = "PROMOTED";
pub const NOTE_EXPIRED: &str = "EXPIRED";

/// Loyalty state of one customer at one partner
///
/// Identity is `(partner_id, msisdn)`; `id` is only a storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tier {
    pub id: i64,
    pub partner_id: i64,
    pub msisdn: String,
    pub email: Option<String>,
    pub current_grade: i32,
    pub current_tier: String,
    pub prev_grade: Option<i32>,
    pub prev_tier: Option<String>,
    pub next_grade: Option<i32>,
    pub next_tier: Option<String>,
    /// Qualifying transactions since entering `current_tier`
    pub transaction_recurring: i32,
    pub expired_date: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every write
    pub version: i32,
    /// Journey rows appended by the write that produced this value
    #[sqlx(skip)]
    #[serde(default)]
    pub journey: Vec<TierJourney>,
}

/// Append-only audit row, written with every tier mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TierJourney {
    pub tier_id: i64,
    /// Triggering transaction; `None` for sweep demotions
    pub last_transaction_id: Option<String>,
    pub current_grade: i32,
    pub current_tier: String,
    pub notes: String,
    pub created_by: String,
}

impl TierJourney {
    /// Journey row describing the state `tier` is about to be written with
    pub fn for_tier(
        tier: &Tier,
        last_transaction_id: Option<&str>,
        notes: &str,
        created_by: &str,
    ) -> Self {
        Self {
            tier_id: tier.id,
            last_transaction_id: last_transaction_id.map(str::to_string),
            current_grade: tier.current_grade,
            current_tier: tier.current_tier.clone(),
            notes: notes.to_string(),
            created_by: created_by.to_string(),
        }
    }
}

/// Input of [`TierEngine::save`](super::TierEngine::save)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSaveRequest {
    pub partner_id: i64,
    pub msisdn: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Transaction that qualified for the tier update
    pub transaction_id: String,
}
