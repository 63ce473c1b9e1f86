//! Transaction payout
//!
//! One qualifying transaction end to end:
//!
//! ```text
//! CashbackRateResolver  -> cashback        (NoCashback)
//! TierEngine::save      -> TierOutcome     (technical)
//! H2hFactory            -> H2hReceipt      (MerchantCodeInvalid / BadPayload / H2hCashbackFailed)
//! ```
//!
//! The tier reward is added to the cashback only when the transaction
//! itself earned it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::cashback::{CashbackAmount, CashbackRateResolver};
use crate::error::AppError;
use crate::h2h::{H2hFactory, H2hReceipt, H2hSendCashbackRequest};
use crate::tier::{TierEngine, TierOutcome, TierSaveRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub partner_id: i64,
    pub msisdn: String,
    #[serde(default)]
    pub email: Option<String>,
    pub wallet_code: String,
    pub qty: i32,
    pub amount: Decimal,
    /// Kezbek transaction reference, also the idempotency key at providers
    pub kezbek_ref_no: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutReceipt {
    pub cashback: CashbackAmount,
    pub tier: TierOutcome,
    /// Amount sent to the wallet provider
    pub total: Decimal,
    pub receipt: H2hReceipt,
}

pub struct CashbackPayout {
    resolver: CashbackRateResolver,
    tiers: Arc<TierEngine>,
    dispatch: Arc<H2hFactory>,
}

impl CashbackPayout {
    pub fn new(
        resolver: CashbackRateResolver,
        tiers: Arc<TierEngine>,
        dispatch: Arc<H2hFactory>,
    ) -> Self {
        Self {
            resolver,
            tiers,
            dispatch,
        }
    }

    pub async fn process(&self, req: &PayoutRequest) -> Result<PayoutReceipt, AppError> {
        let cashback = self
            .resolver
            .cashback_for_transaction(req.qty, req.amount)
            .await?;

        let tier = self
            .tiers
            .save(&TierSaveRequest {
                partner_id: req.partner_id,
                msisdn: req.msisdn.clone(),
                email: req.email.clone(),
                transaction_id: req.kezbek_ref_no.clone(),
            })
            .await?;

        let reward = match &tier {
            TierOutcome::RewardEarned(p) => p.reward,
            _ => Decimal::ZERO,
        };
        let total = cashback.amount + reward;

        let receipt = self
            .dispatch
            .send_cashback(&H2hSendCashbackRequest {
                amount: total,
                wallet_code: req.wallet_code.clone(),
                destination: req.msisdn.clone(),
                notes: format!("Kezbek cashback {}", req.kezbek_ref_no),
                kezbek_ref_no: req.kezbek_ref_no.clone(),
                host_code: None,
            })
            .await?;

        info!(
            kezbek_ref_no = %req.kezbek_ref_no,
            partner_id = req.partner_id,
            cashback = %cashback.amount,
            reward = %reward,
            host_code = %receipt.host_code,
            "Cashback paid out"
        );

        Ok(PayoutReceipt {
            cashback,
            tier,
            total,
            receipt,
        })
    }
}
