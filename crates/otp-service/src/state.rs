//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::gateway::{ConfirmationGateway, HttpConfirmationGateway};
use crate::otp::OtpEngine;
use crate::store::{MemoryOtpStore, OtpStore, RedisOtpStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// OTP lifecycle engine (stateless, all data lives in the store)
    pub engine: Arc<OtpEngine>,
}

impl AppState {
    /// Build the store, gateway and engine described by the configuration
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn OtpStore> = match config.store {
            StoreBackend::Redis => {
                let store = RedisOtpStore::connect(&config.redis_url, config.store_timeout()).await?;
                tracing::info!(redis_url = %config.redis_url, "✅ Redis connected");
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory OTP store, state is not shared between instances");
                Arc::new(MemoryOtpStore::new())
            }
        };

        let gateway = HttpConfirmationGateway::new(
            &config.confirmation.base_url,
            config.confirmation_timeout(),
        )?;
        tracing::info!(endpoint = %gateway.endpoint(), "Confirmation endpoint configured");

        Ok(Self::from_parts(
            store,
            Arc::new(gateway),
            config,
        ))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        store: Arc<dyn OtpStore>,
        gateway: Arc<dyn ConfirmationGateway>,
        config: &AppConfig,
    ) -> Self {
        let engine = OtpEngine::new(
            store,
            gateway,
            config.otp.policy(),
            config.public_base_url.clone(),
        );

        Self {
            engine: Arc::new(engine),
        }
    }
}
