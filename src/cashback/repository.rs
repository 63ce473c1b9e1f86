//! Bracket storage

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use super::{BracketError, CashbackBracket};
use crate::db::SafeRow;

/// Active brackets whose quantity and transaction ranges contain the input
#[async_trait]
pub trait BracketRepository: Send + Sync {
    async fn find_matching(
        &self,
        qty: i32,
        amount: Decimal,
    ) -> Result<Vec<CashbackBracket>, BracketError>;
}

pub struct PgBracketRepository {
    pool: PgPool,
}

impl PgBracketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BracketRepository for PgBracketRepository {
    async fn find_matching(
        &self,
        qty: i32,
        amount: Decimal,
    ) -> Result<Vec<CashbackBracket>, BracketError> {
        let rows = sqlx::query(
            r#"
            SELECT id, min_qty, max_qty, min_transaction, max_transaction,
                   percentage, status
            FROM cashback_brackets
            WHERE status = 1
              AND min_qty <= $1 AND $1 <= max_qty
              AND min_transaction <= $2 AND $2 <= max_transaction
            ORDER BY id ASC
            "#,
        )
        .bind(qty)
        .bind(amount)
        .fetch_all(&self.pool)
        .await?;

        // Rows with unreadable columns are logged and skipped
        let brackets = rows
            .iter()
            .filter_map(|row| {
                Some(CashbackBracket {
                    id: row.try_get_log("id")?,
                    min_qty: row.try_get_log("min_qty")?,
                    max_qty: row.try_get_log("max_qty")?,
                    min_transaction: row.try_get_log("min_transaction")?,
                    max_transaction: row.try_get_log("max_transaction")?,
                    percentage: row.try_get_log("percentage")?,
                    status: row.try_get_log("status")?,
                })
            })
            .collect();

        Ok(brackets)
    }
}
