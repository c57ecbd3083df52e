//! HTTP client for the transaction confirmation service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use otp_common::constants::routes;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::{ConfirmationGateway, GatewayError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest<'a> {
    user_id: Uuid,
    offer_id: &'a str,
}

/// Posts `{ userId, offerId }` to the confirmation service
pub struct HttpConfirmationGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpConfirmationGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build confirmation HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                routes::CONFIRM_TRANSACTION
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ConfirmationGateway for HttpConfirmationGateway {
    async fn confirm(&self, user_id: Uuid, offer_id: &str) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(&ConfirmRequest { user_id, offer_id })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GatewayError::Status(status.as_u16()));
        }

        tracing::debug!(
            user_id = %user_id,
            offer_id = %offer_id,
            "Transaction confirmed"
        );

        Ok(())
    }
}
