//! TopIn adapter
//!
//! Balance top-up with a static API key. The provider's reference code and
//! timestamp are passed through unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TOPIN;
use crate::h2h::config::ApiKeyProviderConfig;
use crate::h2h::transport::H2hTransport;
use crate::h2h::{H2hProvider, H2hSendCashbackRequest, H2hTransfer, ProviderError};

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Serialize)]
struct TopUpRequest<'a> {
    amount: Decimal,
    phone: &'a str,
    description: &'a str,
    external_id: &'a str,
    wallet: &'a str,
}

#[derive(Deserialize)]
struct TopUpResponse {
    ref_code: String,
    timestamp: DateTime<Utc>,
}

pub struct TopInProvider {
    transport: H2hTransport,
    config: ApiKeyProviderConfig,
}

impl TopInProvider {
    pub fn new(config: ApiKeyProviderConfig) -> Result<Self, ProviderError> {
        let transport = H2hTransport::new(TOPIN, config.transport.clone())?;
        Ok(Self { transport, config })
    }
}

#[async_trait]
impl H2hProvider for TopInProvider {
    fn code(&self) -> &'static str {
        TOPIN
    }

    async fn send_cashback(
        &self,
        req: &H2hSendCashbackRequest,
    ) -> Result<H2hTransfer, ProviderError> {
        let url = format!("{}/api/v1/balance/topup", self.config.base_url);
        let body = TopUpRequest {
            amount: req.amount,
            phone: &req.destination,
            description: &req.notes,
            external_id: &req.kezbek_ref_no,
            wallet: &req.wallet_code,
        };

        let resp: TopUpResponse = self
            .transport
            .execute(|c| {
                c.post(&url)
                    .header(API_KEY_HEADER, &self.config.api_key)
                    .json(&body)
            })
            .await?;

        Ok(H2hTransfer {
            transaction_id: resp.ref_code,
            transaction_timestamp: resp.timestamp,
        })
    }
}
