//! In-process OTP store with per-key expiry.

use async_trait::async_trait;
use otp_common::{OtpRecord, PairKey};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{OtpStore, StoreError};

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Drop the entry under `key` if it has expired, then return what is left
fn live<'a, T>(map: &'a mut HashMap<PairKey, Entry<T>>, key: &PairKey) -> Option<&'a mut Entry<T>> {
    let now = Instant::now();
    if map.get(key).is_some_and(|e| !e.is_live(now)) {
        map.remove(key);
    }
    map.get_mut(key)
}

/// Single-process store; state is lost on restart and not shared between instances
pub struct MemoryOtpStore {
    records: Mutex<HashMap<PairKey, Entry<OtpRecord>>>,
    resends: Mutex<HashMap<PairKey, Entry<u32>>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for MemoryOtpStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            resends: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(&self, key: &PairKey, record: &OtpRecord, ttl: Duration) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;

        // Sweep on write so abandoned pairs do not accumulate
        let now = Instant::now();
        records.retain(|_, e| e.is_live(now));

        records.insert(key.clone(), Entry::new(record.clone(), ttl));
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &PairKey,
        record: &OtpRecord,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;

        let now = Instant::now();
        records.retain(|_, e| e.is_live(now));

        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.clone(), Entry::new(record.clone(), ttl));
        Ok(true)
    }

    async fn get(&self, key: &PairKey) -> Result<Option<OtpRecord>, StoreError> {
        let mut records = self.records.lock().await;
        Ok(live(&mut records, key).map(|e| e.value.clone()))
    }

    async fn update_attempts(&self, key: &PairKey, attempts: u32) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let entry = live(&mut records, key).ok_or(StoreError::NotFound)?;

        // expires_at is left alone
        entry.value.attempts = attempts;
        Ok(())
    }

    async fn delete(&self, key: &PairKey) -> Result<(), StoreError> {
        self.records.lock().await.remove(key);
        Ok(())
    }

    async fn increment_resends(&self, key: &PairKey, window: Duration) -> Result<u32, StoreError> {
        let mut resends = self.resends.lock().await;

        // Counters of pairs that never come back are dropped here
        let now = Instant::now();
        resends.retain(|_, e| e.is_live(now));

        let count = match resends.get_mut(key) {
            Some(entry) => {
                entry.value += 1;
                entry.value
            }
            None => {
                resends.insert(key.clone(), Entry::new(1, window));
                1
            }
        };

        Ok(count)
    }

    async fn resend_count(&self, key: &PairKey) -> Result<u32, StoreError> {
        let mut resends = self.resends.lock().await;
        Ok(live(&mut resends, key).map_or(0, |e| e.value))
    }

    async fn reset_resends(&self, key: &PairKey) -> Result<(), StoreError> {
        self.resends.lock().await.remove(key);
        Ok(())
    }

    async fn remaining_ttl(&self, key: &PairKey) -> Result<Option<Duration>, StoreError> {
        let mut records = self.records.lock().await;
        let now = Instant::now();
        Ok(live(&mut records, key).map(|e| e.expires_at.saturating_duration_since(now)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otp_common::OtpCode;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    const WINDOW: Duration = Duration::from_secs(60);

    fn pair() -> PairKey {
        PairKey::new(Uuid::new_v4(), "offer-1")
    }

    fn record(key: &PairKey) -> OtpRecord {
        OtpRecord::issue(key, OtpCode::parse("424242").unwrap(), 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_expires() {
        let store = MemoryOtpStore::new();
        let key = pair();

        assert_ok!(store.put(&key, &record(&key), Duration::from_secs(30)).await);
        assert!(store.get(&key).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.remaining_ttl(&key).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_attempts_keeps_ttl() {
        let store = MemoryOtpStore::new();
        let key = pair();

        store.put(&key, &record(&key), Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        let before = store.remaining_ttl(&key).await.unwrap().unwrap();
        assert_ok!(store.update_attempts(&key, 1).await);
        let after = store.remaining_ttl(&key).await.unwrap().unwrap();

        assert_eq!(before, after);
        assert_eq!(after, Duration::from_secs(40));
        assert_eq!(store.get(&key).await.unwrap().unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_update_attempts_requires_record() {
        let store = MemoryOtpStore::new();
        let err = assert_err!(store.update_attempts(&pair(), 1).await);
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryOtpStore::new();
        let key = pair();

        store.put(&key, &record(&key), Duration::from_secs(60)).await.unwrap();
        store.update_attempts(&key, 3).await.unwrap();

        let fresh = OtpRecord::issue(&key, OtpCode::parse("000111").unwrap(), 1);
        store.put(&key, &fresh, Duration::from_secs(60)).await.unwrap();

        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.code.as_str(), "000111");
        assert_eq!(stored.attempts, 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryOtpStore::new();
        let key = pair();

        assert_ok!(store.delete(&key).await);
        store.put(&key, &record(&key), Duration::from_secs(60)).await.unwrap();
        assert_ok!(store.delete(&key).await);
        assert_ok!(store.delete(&key).await);
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_window_is_fixed() {
        let store = MemoryOtpStore::new();
        let key = pair();

        assert_eq!(store.resend_count(&key).await.unwrap(), 0);
        assert_eq!(store.increment_resends(&key, WINDOW).await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(store.increment_resends(&key, WINDOW).await.unwrap(), 2);

        // Window was armed by the first increment, not the second
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.resend_count(&key).await.unwrap(), 0);
        assert_eq!(store.increment_resends(&key, WINDOW).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_counters_are_swept() {
        let store = MemoryOtpStore::new();

        for _ in 0..200 {
            store.increment_resends(&pair(), WINDOW).await.unwrap();
        }
        assert_eq!(store.resends.lock().await.len(), 200);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.increment_resends(&pair(), WINDOW).await.unwrap();

        assert_eq!(store.resends.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_if_absent() {
        let store = MemoryOtpStore::new();
        let key = pair();

        assert!(store.put_if_absent(&key, &record(&key), WINDOW).await.unwrap());

        let other = OtpRecord::issue(&key, OtpCode::parse("000111").unwrap(), 0);
        assert!(!store.put_if_absent(&key, &other, WINDOW).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().unwrap().code.as_str(), "424242");

        // An expired record does not block a new one
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.put_if_absent(&key, &other, WINDOW).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().unwrap().code.as_str(), "000111");
    }

    #[tokio::test]
    async fn test_resend_counter_outlives_record() {
        let store = MemoryOtpStore::new();
        let key = pair();

        store.put(&key, &record(&key), Duration::from_secs(60)).await.unwrap();
        store.increment_resends(&key, WINDOW).await.unwrap();
        store.delete(&key).await.unwrap();

        assert_eq!(store.resend_count(&key).await.unwrap(), 1);

        assert_ok!(store.reset_resends(&key).await);
        assert_ok!(store.reset_resends(&key).await);
        assert_eq!(store.resend_count(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pairs_are_isolated() {
        let store = MemoryOtpStore::new();
        let user = Uuid::new_v4();
        let a = PairKey::new(user, "offer-a");
        let b = PairKey::new(user, "offer-b");

        store.put(&a, &record(&a), Duration::from_secs(60)).await.unwrap();
        store.increment_resends(&a, WINDOW).await.unwrap();

        assert!(store.get(&b).await.unwrap().is_none());
        assert_eq!(store.resend_count(&b).await.unwrap(), 0);
    }
}
