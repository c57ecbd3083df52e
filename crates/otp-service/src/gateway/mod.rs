//! Transaction confirmation gateway.
//!
//! A single outbound call made once a submitted code matches. The engine
//! treats every failure the same way; the variants only exist for logs.

mod http;

pub use http::HttpConfirmationGateway;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connect error, timeout, or broken response
    #[error("confirmation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Anything other than 200 OK
    #[error("confirmation service returned status {0}")]
    Status(u16),
}

/// Confirms the transaction behind an offer once the user proved possession of the code
#[async_trait]
pub trait ConfirmationGateway: Send + Sync {
    /// Single attempt, bounded by the implementation's timeout; never retried here
    async fn confirm(&self, user_id: Uuid, offer_id: &str) -> Result<(), GatewayError>;
}
