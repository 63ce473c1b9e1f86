//! Dompet adapter
//!
//! Wallet transfer with a static API key. Dompet expects the wallet code in
//! lower case.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DOMPET;
use crate::h2h::config::ApiKeyProviderConfig;
use crate::h2h::transport::H2hTransport;
use crate::h2h::{H2hProvider, H2hSendCashbackRequest, H2hTransfer, ProviderError};

const API_KEY_HEADER: &str = "X-Dompet-Key";

#[derive(Serialize)]
struct WalletTransferRequest<'a> {
    amount: Decimal,
    destination: &'a str,
    notes: &'a str,
    ref_no: &'a str,
    wallet_code: String,
}

#[derive(Deserialize)]
struct WalletTransferResponse {
    transaction_ref: String,
}

pub struct DompetProvider {
    transport: H2hTransport,
    config: ApiKeyProviderConfig,
}

impl DompetProvider {
    pub fn new(config: ApiKeyProviderConfig) -> Result<Self, ProviderError> {
        let transport = H2hTransport::new(DOMPET, config.transport.clone())?;
        Ok(Self { transport, config })
    }
}

#[async_trait]
impl H2hProvider for DompetProvider {
    fn code(&self) -> &'static str {
        DOMPET
    }

    async fn send_cashback(
        &self,
        req: &H2hSendCashbackRequest,
    ) -> Result<H2hTransfer, ProviderError> {
        let url = format!("{}/wallet/transfer", self.config.base_url);
        let body = WalletTransferRequest {
            amount: req.amount,
            destination: &req.destination,
            notes: &req.notes,
            ref_no: &req.kezbek_ref_no,
            wallet_code: req.wallet_code.to_lowercase(),
        };

        let resp: WalletTransferResponse = self
            .transport
            .execute(|c| {
                c.post(&url)
                    .header(API_KEY_HEADER, &self.config.api_key)
                    .json(&body)
            })
            .await?;

        Ok(H2hTransfer {
            transaction_id: resp.transaction_ref,
            transaction_timestamp: Utc::now(),
        })
    }
}
