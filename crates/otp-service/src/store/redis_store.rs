//! Redis-backed OTP store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use otp_common::{OtpRecord, PairKey};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::future::Future;
use std::time::Duration;

use super::{OtpStore, StoreError};

/// OTP store on a shared Redis instance
#[derive(Clone)]
pub struct RedisOtpStore {
    /// Redis connection manager (auto-reconnecting)
    redis: ConnectionManager,
    /// Deadline for every single Redis call
    op_timeout: Duration,
}

impl RedisOtpStore {
    pub fn new(redis: ConnectionManager, op_timeout: Duration) -> Self {
        Self { redis, op_timeout }
    }

    /// Connect to Redis with a connection manager (handles reconnection)
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let redis = tokio::time::timeout(op_timeout * 5, ConnectionManager::new(client))
            .await
            .context("Timed out connecting to Redis")?
            .context("Failed to connect to Redis")?;

        Ok(Self::new(redis, op_timeout))
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, key: &PairKey, record: &OtpRecord, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let data = serde_json::to_string(record)?;
        let ttl_ms = ttl.as_millis().max(1) as u64;

        self.bounded(conn.pset_ex::<_, _, ()>(key.record_key(), data, ttl_ms))
            .await
    }

    async fn put_if_absent(
        &self,
        key: &PairKey,
        record: &OtpRecord,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();
        let data = serde_json::to_string(record)?;
        let ttl_ms = ttl.as_millis().max(1) as u64;

        let reply: Option<String> = self
            .bounded(
                redis::cmd("SET")
                    .arg(key.record_key())
                    .arg(data)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(reply.is_some())
    }

    async fn get(&self, key: &PairKey) -> Result<Option<OtpRecord>, StoreError> {
        let mut conn = self.redis.clone();
        let data: Option<String> = self.bounded(conn.get(key.record_key())).await?;

        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    async fn update_attempts(&self, key: &PairKey, attempts: u32) -> Result<(), StoreError> {
        let mut record = self.get(key).await?.ok_or(StoreError::NotFound)?;
        record.attempts = attempts;
        let data = serde_json::to_string(&record)?;

        // XX: only overwrite a live key. KEEPTTL: the expiry clock keeps running.
        let mut conn = self.redis.clone();
        let reply: Option<String> = self
            .bounded(
                redis::cmd("SET")
                    .arg(key.record_key())
                    .arg(data)
                    .arg("XX")
                    .arg("KEEPTTL")
                    .query_async(&mut conn),
            )
            .await?;

        match reply {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, key: &PairKey) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        self.bounded(conn.del::<_, ()>(key.record_key())).await
    }

    async fn increment_resends(&self, key: &PairKey, window: Duration) -> Result<u32, StoreError> {
        let mut conn = self.redis.clone();
        let counter_key = key.resend_key();

        let window_secs = window.as_secs().max(1);

        // One MULTI/EXEC: the key is created with its expiry, and INCR keeps
        // that TTL, so the window is armed once and never slides
        let (count,): (u32,) = self
            .bounded(
                redis::pipe()
                    .atomic()
                    .cmd("SET")
                    .arg(&counter_key)
                    .arg(0)
                    .arg("NX")
                    .arg("EX")
                    .arg(window_secs)
                    .ignore()
                    .incr(&counter_key, 1)
                    .query_async(&mut conn),
            )
            .await?;

        Ok(count)
    }

    async fn resend_count(&self, key: &PairKey) -> Result<u32, StoreError> {
        let mut conn = self.redis.clone();
        let count: Option<u32> = self.bounded(conn.get(key.resend_key())).await?;
        Ok(count.unwrap_or(0))
    }

    async fn reset_resends(&self, key: &PairKey) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        self.bounded(conn.del::<_, ()>(key.resend_key())).await
    }

    async fn remaining_ttl(&self, key: &PairKey) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.redis.clone();
        // -2: no such key, -1: key without expiry (never written by this store)
        let ttl_ms: i64 = self.bounded(conn.pttl(key.record_key())).await?;

        if ttl_ms >= 0 {
            Ok(Some(Duration::from_millis(ttl_ms as u64)))
        } else {
            Ok(None)
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let _: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
