//! Per-key async locks for schema mutations.
//!
//! Object mutations lock `object:<name>` plus `field:<name>` for every field
//! they reference; field mutations lock `field:<name>`. Keys are always
//! acquired in sorted order, so two mutations that share keys cannot
//! deadlock, and mutations with disjoint keys run concurrently.
//!
//! Entries are held weakly: a key's mutex lives only while some task holds
//! or waits for it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::OwnedMutexGuard;

type KeyMutex = tokio::sync::Mutex<()>;

/// Lock key for an object.
pub fn object_key(name: &str) -> String {
    format!("object:{name}")
}

/// Lock key for a field.
pub fn field_key(name: &str) -> String {
    format!("field:{name}")
}

/// A set of named async mutexes.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Weak<KeyMutex>>>,
}

/// Holds every lock of one mutation until dropped.
#[derive(Debug)]
pub struct KeyedGuard {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyedGuard {
    /// The keys held, in acquisition order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl KeyedLocks {
    /// Creates an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, key: &str) -> Arc<KeyMutex> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(key).and_then(Weak::upgrade) {
            return existing;
        }
        entries.retain(|_, weak| weak.strong_count() > 0);
        let mutex = Arc::new(KeyMutex::new(()));
        entries.insert(key.to_string(), Arc::downgrade(&mutex));
        mutex
    }

    /// Acquires every key (deduplicated, in sorted order).
    pub async fn lock<I, S>(&self, keys: I) -> KeyedGuard
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.mutex_for(key).lock_owned().await);
        }
        tracing::trace!(keys = ?keys, "schema locks acquired");
        KeyedGuard {
            keys: keys.into_iter().collect(),
            _guards: guards,
        }
    }

    /// Number of keys currently alive (held or awaited).
    pub fn live_keys(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_keys_sorted_and_deduplicated() {
        let locks = KeyedLocks::new();
        let guard = locks
            .lock([object_key("b"), field_key("x"), object_key("a"), field_key("x")])
            .await;
        assert_eq!(guard.keys(), ["field:x", "object:a", "object:b"]);
    }

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock([object_key("customer")]).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock([object_key("customer")]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock([object_key("customer")]).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock([object_key("order")])).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_overlapping_sets_do_not_deadlock() {
        let locks = Arc::new(KeyedLocks::new());
        let mut tasks = Vec::new();
        for i in 0..8 {
            let locks = Arc::clone(&locks);
            tasks.push(tokio::spawn(async move {
                let keys = if i % 2 == 0 {
                    vec![field_key("a"), field_key("b")]
                } else {
                    vec![field_key("b"), field_key("a")]
                };
                let _g = locks.lock(keys).await;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_entries_released_after_use() {
        let locks = KeyedLocks::new();
        {
            let _g = locks.lock([object_key("tmp")]).await;
            assert_eq!(locks.live_keys(), 1);
        }
        assert_eq!(locks.live_keys(), 0);
    }
}
