//! Cashback Rate Resolver
//!
//! Brackets are queried live on every call; nothing is cached. When more
//! than one active bracket contains `(qty, amount)` the most specific one
//! wins:
//!
//! 1. narrowest quantity range
//! 2. narrowest transaction range
//! 3. highest percentage
//! 4. lowest id
//!
//! Amounts are rounded to 2 dp, midpoint away from zero.

pub mod repository;

pub use repository::{BracketRepository, PgBracketRepository};

use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{BusinessError, TechnicalError};

/// Bracket status value for active rows
pub const BRACKET_ACTIVE: i16 = 1;

#[derive(Error, Debug)]
pub enum BracketError {
    #[error("No cashback bracket for qty {qty}, amount {amount}")]
    NoMatch { qty: i32, amount: Decimal },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashbackBracket {
    pub id: i64,
    pub min_qty: i32,
    pub max_qty: i32,
    pub min_transaction: Decimal,
    pub max_transaction: Decimal,
    pub percentage: Decimal,
    pub status: i16,
}

impl CashbackBracket {
    pub fn is_active(&self) -> bool {
        self.status == BRACKET_ACTIVE
    }

    /// Both ranges are inclusive
    pub fn contains(&self, qty: i32, amount: Decimal) -> bool {
        self.min_qty <= qty
            && qty <= self.max_qty
            && self.min_transaction <= amount
            && amount <= self.max_transaction
    }

    fn qty_width(&self) -> i64 {
        i64::from(self.max_qty) - i64::from(self.min_qty)
    }

    fn transaction_width(&self) -> Decimal {
        self.max_transaction - self.min_transaction
    }

    /// `Less` means `self` is preferred
    fn specificity(&self, other: &Self) -> Ordering {
        self.qty_width()
            .cmp(&other.qty_width())
            .then_with(|| self.transaction_width().cmp(&other.transaction_width()))
            .then_with(|| other.percentage.cmp(&self.percentage))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Computed cashback for one transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashbackAmount {
    pub amount: Decimal,
    pub percentage: Decimal,
    pub bracket_id: i64,
}

/// Pick the winning bracket among candidates that contain `(qty, amount)`
///
/// Inactive or non-containing candidates are ignored, so the result does not
/// depend on how well the repository filtered.
pub fn select_bracket(
    candidates: &[CashbackBracket],
    qty: i32,
    amount: Decimal,
) -> Option<&CashbackBracket> {
    candidates
        .iter()
        .filter(|b| b.is_active() && b.contains(qty, amount))
        .min_by(|a, b| a.specificity(b))
}

/// `amount * percentage / 100`, 2 dp, midpoint away from zero
pub fn compute_cashback(amount: Decimal, percentage: Decimal) -> Decimal {
    (amount * percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub struct CashbackRateResolver {
    repository: Arc<dyn BracketRepository>,
}

impl CashbackRateResolver {
    pub fn new(repository: Arc<dyn BracketRepository>) -> Self {
        Self { repository }
    }

    /// Cashback for a `(qty, amount)` pair
    ///
    /// Read-only; repeated calls with the same inputs and the same bracket
    /// table return the same value.
    pub async fn find_cashback_amount(
        &self,
        qty: i32,
        amount: Decimal,
    ) -> Result<CashbackAmount, TechnicalError> {
        let candidates = self
            .repository
            .find_matching(qty, amount)
            .await
            .map_err(|e| TechnicalError::new(e.to_string()))?;

        let Some(bracket) = select_bracket(&candidates, qty, amount) else {
            return Err(TechnicalError::new(
                BracketError::NoMatch { qty, amount }.to_string(),
            ));
        };

        if candidates.len() > 1 {
            debug!(
                qty,
                amount = %amount,
                candidates = candidates.len(),
                bracket_id = bracket.id,
                "Overlapping cashback brackets"
            );
        }

        Ok(CashbackAmount {
            amount: compute_cashback(amount, bracket.percentage),
            percentage: bracket.percentage,
            bracket_id: bracket.id,
        })
    }

    /// Same as [`find_cashback_amount`](Self::find_cashback_amount), with
    /// every failure surfaced to the client as `NoCashback`
    pub async fn cashback_for_transaction(
        &self,
        qty: i32,
        amount: Decimal,
    ) -> Result<CashbackAmount, BusinessError> {
        self.find_cashback_amount(qty, amount).await.map_err(|e| {
            warn!(ticket = %e.ticket, qty, amount = %amount, "No cashback");
            BusinessError::NoCashback
        })
    }
}
