//! Prefix watcher task.
//!
//! Runs [`StoreClient::watch_prefix`] in a loop on its own tokio task,
//! chaining each returned index into the next call, and publishes the
//! results through a tokio watch channel. One watcher runs per prefix.
//!
//! The first event carries the store's current index (the initial
//! `wait_index` is 0), so consumers can do their first sync on it. That
//! baseline is published even when it is 0; only later indexes must advance.

use super::{StoreClient, WatchOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Event published by a prefix watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Something under `prefix` changed at `index`.
    Changed { prefix: String, index: u64 },
    /// The backend failed; the watcher retries after its retry delay.
    Error(String),
}

impl WatchEvent {
    /// Returns true if consumers should re-read the prefix.
    pub fn requires_reload(&self) -> bool {
        matches!(self, WatchEvent::Changed { .. })
    }

    pub fn index(&self) -> Option<u64> {
        match self {
            WatchEvent::Changed { index, .. } => Some(*index),
            WatchEvent::Error(_) => None,
        }
    }
}

/// Settings for a prefix watcher.
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    /// Pause after a backend error before watching again.
    pub retry_delay: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Handle to a running prefix watcher.
pub struct PrefixWatcherHandle {
    /// Latest event; `None` until the first watch returns.
    pub events: watch::Receiver<Option<WatchEvent>>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl PrefixWatcherHandle {
    /// Wait for the next event. Returns `None` once the watcher has stopped.
    pub async fn wait_for_change(&mut self) -> Option<WatchEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow_and_update().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    /// Get the latest event without waiting.
    pub fn latest_event(&self) -> Option<WatchEvent> {
        self.events.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the watcher and wait for its task to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Prefix watcher task failed: {}", e);
        }
    }
}

/// Start watching `prefix` on a dedicated task.
///
/// The watcher stops when `cancel` fires, when [`PrefixWatcherHandle::stop`]
/// is called, or when every event receiver is dropped.
pub fn spawn_prefix_watcher(
    client: Arc<dyn StoreClient>,
    prefix: impl Into<String>,
    settings: WatcherSettings,
    cancel: CancellationToken,
) -> PrefixWatcherHandle {
    let prefix = prefix.into();
    let (event_tx, event_rx) = watch::channel(None);
    let cancel = cancel.child_token();

    info!(prefix = %prefix, "Watching backend prefix");
    let task = tokio::spawn(run_watch_loop(
        client,
        prefix,
        settings,
        cancel.clone(),
        event_tx,
    ));

    PrefixWatcherHandle {
        events: event_rx,
        cancel,
        task,
    }
}

async fn run_watch_loop(
    client: Arc<dyn StoreClient>,
    prefix: String,
    settings: WatcherSettings,
    cancel: CancellationToken,
    tx: watch::Sender<Option<WatchEvent>>,
) {
    // `None` until the first reply to a wait index of 0 sets the baseline.
    let mut index: Option<u64> = None;
    loop {
        let wait_index = index.unwrap_or(0);
        match client.watch_prefix(&prefix, wait_index, &cancel).await {
            Ok(WatchOutcome::Changed(next)) if index.is_none_or(|current| next > current) => {
                debug!(prefix = %prefix, index = next, "Backend prefix changed");
                index = Some(next);
                let event = WatchEvent::Changed {
                    prefix: prefix.clone(),
                    index: next,
                };
                if tx.send(Some(event)).is_err() {
                    info!(prefix = %prefix, "Prefix watcher receiver dropped, stopping");
                    return;
                }
            }
            Ok(WatchOutcome::Changed(stale)) => {
                if wait_index == 0 {
                    // A wait index of 0 cannot block, so a store with no
                    // history is polled until its first change.
                    debug!(prefix = %prefix, "Backend has no changes yet");
                } else {
                    // Never move the index backward; back off instead of spinning.
                    warn!(
                        prefix = %prefix,
                        index = wait_index,
                        returned = stale,
                        "Backend returned a non-advancing index"
                    );
                }
                if !pause(&cancel, settings.retry_delay).await {
                    return;
                }
            }
            Ok(WatchOutcome::Cancelled) => {
                info!(prefix = %prefix, "Prefix watcher cancelled");
                return;
            }
            Err(e) => {
                error!(prefix = %prefix, "Backend watch failed: {}", e);
                if tx.send(Some(WatchEvent::Error(e.to_string()))).is_err() {
                    return;
                }
                if !pause(&cancel, settings.retry_delay).await {
                    return;
                }
            }
        }
    }
}

/// Sleep for `delay`. Returns false if cancelled first.
async fn pause(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
