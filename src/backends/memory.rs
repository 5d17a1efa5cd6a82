//! In-memory [`StoreClient`].
//!
//! Keeps keys in a [`BTreeMap`] with etcd-style modification indexes and
//! the latest change index of every key ever touched. Used by tests and as
//! the reference behavior adapters are checked against.
//!
//! The store index starts at 1, so a `wait_index` of 0 always yields a
//! non-zero index to chain from.

use super::{StoreClient, WatchOutcome};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct State {
    entries: BTreeMap<String, String>,
    /// Latest set/delete index per key. Deleted keys keep their entry so
    /// the delete still wakes watchers.
    changes: BTreeMap<String, u64>,
    index: u64,
    reachable: bool,
}

impl State {
    fn check_reachable(&self) -> BackendResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(BackendError::Unreachable("memory store is offline".to_string()))
        }
    }

    /// Highest change index under `prefix` that is greater than `after`.
    fn latest_change(&self, prefix: &str, after: u64) -> Option<u64> {
        self.changes
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, index)| *index)
            .filter(|index| *index > after)
            .max()
    }

    fn record(&mut self, key: &str) -> u64 {
        self.index += 1;
        self.changes.insert(key.to_string(), self.index);
        self.index
    }
}

/// Thread-safe in-memory key/value store.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Publishes the store index after every mutation.
    notify: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(1);
        Self {
            state: Mutex::new(State {
                entries: BTreeMap::new(),
                changes: BTreeMap::new(),
                index: 1,
                reachable: true,
            }),
            notify,
        }
    }

    /// Store seeded with `pairs`, one change per pair.
    pub fn with_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (key, value) in pairs {
            store.set(key, value);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set `key` and return the new store index.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> u64 {
        let key = key.into();
        let index = {
            let mut state = self.lock();
            let index = state.record(&key);
            state.entries.insert(key, value.into());
            index
        };
        self.notify.send_replace(index);
        index
    }

    /// Delete `key`. Returns the new store index, or `None` if it was absent.
    pub fn delete(&self, key: &str) -> Option<u64> {
        let index = {
            let mut state = self.lock();
            state.entries.remove(key)?;
            state.record(key)
        };
        self.notify.send_replace(index);
        Some(index)
    }

    /// Current store index.
    pub fn current_index(&self) -> u64 {
        self.lock().index
    }

    /// Simulate the backend going offline or coming back.
    ///
    /// Blocked watchers wake up and observe the new state.
    pub fn set_reachable(&self, reachable: bool) {
        let index = {
            let mut state = self.lock();
            state.reachable = reachable;
            state.index
        };
        self.notify.send_replace(index);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn get_values(&self, keys: &[String]) -> BackendResult<HashMap<String, String>> {
        let state = self.lock();
        state.check_reachable()?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                state
                    .entries
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect())
    }

    async fn watch_prefix(
        &self,
        prefix: &str,
        wait_index: u64,
        cancel: &CancellationToken,
    ) -> BackendResult<WatchOutcome> {
        // Subscribe before inspecting state so a mutation in between still
        // wakes us.
        let mut updates = self.notify.subscribe();
        loop {
            {
                let state = self.lock();
                state.check_reachable()?;
                if wait_index == 0 {
                    return Ok(WatchOutcome::Changed(state.index));
                }
                if let Some(index) = state.latest_change(prefix, wait_index) {
                    return Ok(WatchOutcome::Changed(index));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(WatchOutcome::Cancelled),
                changed = updates.changed() => {
                    if changed.is_err() {
                        return Err(BackendError::Unreachable("memory store closed".to_string()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_values_omits_missing_keys() {
        let store = MemoryStore::with_values([("/app/db/host", "10.0.0.3"), ("/app/db/port", "5432")]);
        let values = store
            .get_values(&keys(&["/app/db/host", "/app/db/user"]))
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("/app/db/host").map(String::as_str), Some("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_get_values_is_exact_match() {
        let store = MemoryStore::with_values([("/app/db/host", "10.0.0.3")]);
        let values = store.get_values(&keys(&["/app/db"])).await.unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_index_advances_on_mutation() {
        let store = MemoryStore::new();
        assert_eq!(store.current_index(), 1);
        assert_eq!(store.set("/a", "1"), 2);
        assert_eq!(store.delete("/a"), Some(3));
        assert_eq!(store.delete("/a"), None);
        assert_eq!(store.current_index(), 3);
    }

    #[tokio::test]
    async fn test_wait_index_zero_returns_current_index() {
        let store = MemoryStore::with_values([("/app/x", "1"), ("/other/y", "2")]);
        let cancel = CancellationToken::new();
        let outcome = store.watch_prefix("/app", 0, &cancel).await.unwrap();
        assert_eq!(outcome, WatchOutcome::Changed(store.current_index()));
    }

    #[tokio::test]
    async fn test_past_change_returned_without_blocking() {
        let store = MemoryStore::new();
        let first = store.set("/app/x", "1");
        store.set("/other/y", "2");
        let cancel = CancellationToken::new();
        let outcome = store.watch_prefix("/app", first - 1, &cancel).await.unwrap();
        assert_eq!(outcome, WatchOutcome::Changed(first));
    }

    #[tokio::test]
    async fn test_watch_blocks_until_change_under_prefix() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let start = store.current_index();

        let watcher = {
            let store = Arc::clone(&store);
            let cancel = cancel.clone();
            tokio::spawn(async move { store.watch_prefix("/app", start, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set("/other/key", "ignored");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!watcher.is_finished());

        let index = store.set("/app/key", "value");
        let outcome = tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, WatchOutcome::Changed(index));
    }

    #[tokio::test]
    async fn test_deletes_count_as_changes() {
        let store = MemoryStore::with_values([("/app/key", "v")]);
        let before = store.current_index();
        let index = store.delete("/app/key").unwrap();
        let outcome = store
            .watch_prefix("/app", before, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, WatchOutcome::Changed(index));
    }

    #[tokio::test]
    async fn test_cancel_returns_promptly() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let start = store.current_index();

        let watcher = {
            let store = Arc::clone(&store);
            let cancel = cancel.clone();
            tokio::spawn(async move { store.watch_prefix("/app", start, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_millis(500), watcher)
            .await
            .expect("watch did not observe cancellation")
            .unwrap();
        assert_eq!(outcome, Ok(WatchOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_unreachable_store_fails() {
        let store = MemoryStore::new();
        store.set_reachable(false);
        assert!(matches!(
            store.get_values(&keys(&["/a"])).await,
            Err(BackendError::Unreachable(_))
        ));
        assert!(matches!(
            store.watch_prefix("/", 0, &CancellationToken::new()).await,
            Err(BackendError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_blocked_watch_fails_when_store_goes_offline() {
        let store = Arc::new(MemoryStore::new());
        let start = store.current_index();
        let watcher = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .watch_prefix("/app", start, &CancellationToken::new())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set_reachable(false);
        let result = tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(BackendError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_change_log_keeps_latest_index_per_key() {
        let store = MemoryStore::new();
        let start = store.current_index();
        for i in 0..100 {
            store.set("/app/counter", i.to_string());
        }
        let last = store.set("/app/other", "x");
        store.delete("/app/other");
        assert_eq!(store.lock().changes.len(), 2);

        let outcome = store
            .watch_prefix("/app", start, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, WatchOutcome::Changed(last + 1));

        let counter = store
            .watch_prefix("/app/counter", start, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(counter, WatchOutcome::Changed(last - 1));
    }
}
