//! Payda adapter
//!
//! Simple transfer with a static API key. Payda answers with a response code
//! and notes only, so the transaction id is synthesized locally from the
//! Kezbek reference number.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PAYDA;
use crate::h2h::config::ApiKeyProviderConfig;
use crate::h2h::transport::H2hTransport;
use crate::h2h::{H2hProvider, H2hSendCashbackRequest, H2hTransfer, ProviderError};
use crate::transaction_id;

const API_KEY_HEADER: &str = "X-API-KEY";
const SUCCESS_CODE: &str = "00";
const TRANSACTION_ID_PREFIX: &str = "PYD";

#[derive(Serialize)]
struct TransferRequest<'a> {
    amount: Decimal,
    destination: &'a str,
    notes: &'a str,
    reference_no: &'a str,
    wallet_code: &'a str,
}

#[derive(Deserialize)]
struct TransferResponse {
    response_code: String,
    #[serde(default)]
    notes: Option<String>,
}

pub struct PaydaProvider {
    transport: H2hTransport,
    config: ApiKeyProviderConfig,
}

impl PaydaProvider {
    pub fn new(config: ApiKeyProviderConfig) -> Result<Self, ProviderError> {
        let transport = H2hTransport::new(PAYDA, config.transport.clone())?;
        Ok(Self { transport, config })
    }
}

#[async_trait]
impl H2hProvider for PaydaProvider {
    fn code(&self) -> &'static str {
        PAYDA
    }

    async fn send_cashback(
        &self,
        req: &H2hSendCashbackRequest,
    ) -> Result<H2hTransfer, ProviderError> {
        let url = format!("{}/v1/transfers", self.config.base_url);
        let body = TransferRequest {
            amount: req.amount,
            destination: &req.destination,
            notes: &req.notes,
            reference_no: &req.kezbek_ref_no,
            wallet_code: &req.wallet_code,
        };

        let resp: TransferResponse = self
            .transport
            .execute(|c| {
                c.post(&url)
                    .header(API_KEY_HEADER, &self.config.api_key)
                    .json(&body)
            })
            .await?;

        let notes = resp.notes.unwrap_or_default();
        if resp.response_code != SUCCESS_CODE {
            return Err(ProviderError::Rejected {
                status: 200,
                message: format!("response code {}: {}", resp.response_code, notes),
            });
        }

        let now = Utc::now();
        let transaction_id = transaction_id::generate(TRANSACTION_ID_PREFIX, now, &req.kezbek_ref_no);
        debug!(provider = PAYDA, transaction_id = %transaction_id, notes = %notes, "Transfer accepted");

        Ok(H2hTransfer {
            transaction_id,
            transaction_timestamp: now,
        })
    }
}
