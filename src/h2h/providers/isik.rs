//! Isik adapter
//!
//! Wallet top-up behind HTTP basic auth. Isik identifies the target wallet
//! as `{wallet_code}_{destination}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ISIK;
use crate::h2h::config::BasicAuthProviderConfig;
use crate::h2h::transport::H2hTransport;
use crate::h2h::{H2hProvider, H2hSendCashbackRequest, H2hTransfer, ProviderError};

#[derive(Serialize)]
struct TopUpRequest<'a> {
    amount: Decimal,
    destination: &'a str,
    notes: &'a str,
    reference: &'a str,
    wallet: String,
}

#[derive(Deserialize)]
struct TopUpResponse {
    topup_ref: String,
    topup_time: DateTime<Utc>,
}

pub struct IsikProvider {
    transport: H2hTransport,
    config: BasicAuthProviderConfig,
}

impl IsikProvider {
    pub fn new(config: BasicAuthProviderConfig) -> Result<Self, ProviderError> {
        let transport = H2hTransport::new(ISIK, config.transport.clone())?;
        Ok(Self { transport, config })
    }
}

#[async_trait]
impl H2hProvider for IsikProvider {
    fn code(&self) -> &'static str {
        ISIK
    }

    async fn send_cashback(
        &self,
        req: &H2hSendCashbackRequest,
    ) -> Result<H2hTransfer, ProviderError> {
        let url = format!("{}/v2/topup", self.config.base_url);
        let body = TopUpRequest {
            amount: req.amount,
            destination: &req.destination,
            notes: &req.notes,
            reference: &req.kezbek_ref_no,
            wallet: format!("{}_{}", req.wallet_code, req.destination),
        };

        let resp: TopUpResponse = self
            .transport
            .execute(|c| {
                c.post(&url)
                    .basic_auth(&self.config.username, Some(&self.config.password))
                    .json(&body)
            })
            .await?;

        Ok(H2hTransfer {
            transaction_id: resp.topup_ref,
            transaction_timestamp: resp.topup_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h2h::TransportConfig;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_wallet_is_rewritten_and_basic_auth_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/topup")
                    // base64("kezbek:pass")
                    .header("Authorization", "Basic a2V6YmVrOnBhc3M=")
                    .body_contains("\"wallet\":\"ISIK_628444\"");
                then.status(200).json_body(json!({
                    "topup_ref": "ISK-7",
                    "topup_time": "2024-02-03T04:05:06Z"
                }));
            })
            .await;

        let provider = IsikProvider::new(BasicAuthProviderConfig {
            base_url: server.base_url(),
            username: "kezbek".to_string(),
            password: "pass".to_string(),
            transport: TransportConfig {
                timeout_ms: 2_000,
                retry_count: 0,
                retry_delay_ms: 1,
            },
        })
        .unwrap();

        let transfer = provider
            .send_cashback(&H2hSendCashbackRequest {
                amount: Decimal::from(300),
                wallet_code: "ISIK".to_string(),
                destination: "628444".to_string(),
                notes: "cashback".to_string(),
                kezbek_ref_no: "KZB-4".to_string(),
                host_code: None,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(transfer.transaction_id, "ISK-7");
    }
}
