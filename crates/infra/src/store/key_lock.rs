//! Per-key serialization for the in-memory store.
//!
//! One async mutex per live [`BalanceKey`], created on demand and dropped
//! again once nobody holds or waits for it. Waiting is bounded: a caller that
//! cannot get the key within the configured timeout gets
//! [`StoreError::Contention`] instead of hanging.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use quotaledger_ledger::BalanceKey;

use super::r#trait::StoreError;

#[derive(Debug)]
pub struct KeyLocks {
    slots: Mutex<HashMap<BalanceKey, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl KeyLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire exclusive access to `key`. Other keys are never touched.
    pub async fn acquire(&self, key: &BalanceKey) -> Result<KeyGuard<'_>, StoreError> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| StoreError::Unavailable("lock table poisoned".to_string()))?;
            slots.entry(key.clone()).or_default().clone()
        };

        match tokio::time::timeout(self.timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(KeyGuard {
                locks: self,
                key: key.clone(),
                guard: Some(guard),
            }),
            Err(_) => {
                tracing::warn!(key = %key, timeout_ms = self.timeout.as_millis() as u64, "per-key lock wait timed out");
                // Our clone of the slot is dropped here, so pruning can see it.
                self.prune(key);
                Err(StoreError::Contention { key: key.to_string() })
            }
        }
    }

    /// Number of keys with a live slot (held or awaited).
    pub fn live_keys(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn prune(&self, key: &BalanceKey) {
        if let Ok(mut slots) = self.slots.lock() {
            // Clones are only handed out under this lock, so a count of one
            // means nobody holds or waits for the slot.
            if slots.get(key).is_some_and(|s| Arc::strong_count(s) == 1) {
                slots.remove(key);
            }
        }
    }
}

/// Exclusive hold on one key; released on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: BalanceKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &BalanceKey {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.prune(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotaledger_core::{CategoryCode, HolderId, Period, TenantId};

    fn key(tenant: TenantId, holder: &str) -> BalanceKey {
        BalanceKey::new(
            tenant,
            HolderId::parse(holder).unwrap(),
            CategoryCode::parse("COD").unwrap(),
            Period::new(2024).unwrap(),
        )
    }

    #[tokio::test]
    async fn second_waiter_times_out_with_contention() {
        let locks = KeyLocks::new(Duration::from_millis(30));
        let k = key(TenantId::new(), "H1");

        let _held = locks.acquire(&k).await.unwrap();
        let err = locks.acquire(&k).await.unwrap_err();
        assert!(matches!(err, StoreError::Contention { .. }));
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = KeyLocks::new(Duration::from_millis(30));
        let t = TenantId::new();

        let _a = locks.acquire(&key(t, "H1")).await.unwrap();
        let _b = locks.acquire(&key(t, "H2")).await.unwrap();
        // Same holder code in another tenant is another key.
        let _c = locks.acquire(&key(TenantId::new(), "H1")).await.unwrap();
        assert_eq!(locks.live_keys(), 3);
    }

    #[tokio::test]
    async fn released_slots_are_pruned() {
        let locks = KeyLocks::new(Duration::from_millis(30));
        let k = key(TenantId::new(), "H1");
        {
            let _g = locks.acquire(&k).await.unwrap();
            assert_eq!(locks.live_keys(), 1);
        }
        assert_eq!(locks.live_keys(), 0);
        let _again = locks.acquire(&k).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiter_gets_the_key_after_release() {
        let locks = Arc::new(KeyLocks::new(Duration::from_secs(2)));
        let k = key(TenantId::new(), "H1");

        let held = locks.acquire(&k).await.unwrap();
        let waiter = {
            let locks = locks.clone();
            let k = k.clone();
            tokio::spawn(async move { locks.acquire(&k).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap().is_ok());
    }
}
