//! OTP record storage.
//!
//! Two backends implement [`OtpStore`]:
//! - `RedisOtpStore` - production, shared across service instances
//! - `MemoryOtpStore` - single process, for development and tests
//!
//! Absence is never an error: an expired or never-issued record reads as
//! `None`, a missing resend counter reads as 0.

mod memory;
mod redis_store;

pub use memory::MemoryOtpStore;
pub use redis_store::RedisOtpStore;

use async_trait::async_trait;
use otp_common::{OtpRecord, PairKey};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// `update_attempts` found no record (expired or deleted meanwhile)
    #[error("OTP record not found")]
    NotFound,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt OTP record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// TTL-backed storage for OTP records and resend counters, keyed by pair
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Overwrite the record and set its expiry `ttl` from now
    async fn put(&self, key: &PairKey, record: &OtpRecord, ttl: Duration) -> Result<(), StoreError>;

    /// Write the record only if no live one exists; `false` when one does
    async fn put_if_absent(
        &self,
        key: &PairKey,
        record: &OtpRecord,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Fetch the live record, `None` if absent or expired
    async fn get(&self, key: &PairKey) -> Result<Option<OtpRecord>, StoreError>;

    /// Rewrite the attempt count without touching the remaining TTL
    async fn update_attempts(&self, key: &PairKey, attempts: u32) -> Result<(), StoreError>;

    /// Remove the record; absent is fine
    async fn delete(&self, key: &PairKey) -> Result<(), StoreError>;

    /// Atomically bump the resend counter; the increment that creates it arms `window`
    async fn increment_resends(&self, key: &PairKey, window: Duration) -> Result<u32, StoreError>;

    /// Current resend counter, 0 if absent
    async fn resend_count(&self, key: &PairKey) -> Result<u32, StoreError>;

    /// Drop the resend counter; absent is fine
    async fn reset_resends(&self, key: &PairKey) -> Result<(), StoreError>;

    /// Remaining lifetime of the record, `None` if absent
    async fn remaining_ttl(&self, key: &PairKey) -> Result<Option<Duration>, StoreError>;

    /// Backend liveness check
    async fn ping(&self) -> Result<(), StoreError>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}
