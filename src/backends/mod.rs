//! Backend abstraction.
//!
//! This module defines the [`StoreClient`] trait, the only surface a
//! key/value backend adapter exposes to the rest of the daemon, and the
//! [`BackendDescriptor`] an adapter is constructed from.
//!
//! # Watch semantics
//!
//! [`StoreClient::watch_prefix`] is a long poll. Given a `wait_index` it
//! returns once a change under the prefix happened at an index greater
//! than `wait_index`. A `wait_index` of 0 returns the current index
//! immediately. Feeding each returned index into the next call never
//! misses a change, never reports one twice, and never goes backward.
//!
//! Cancellation is cooperative: the call observes the token and returns
//! [`WatchOutcome::Cancelled`], which is not an error.

mod memory;
mod registry;
pub mod watcher;

pub use memory::MemoryStore;
pub use registry::{StoreClientConstructor, StoreClientRegistry};

use crate::config::{BackendKind, Config, Scheme};
use crate::error::BackendResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Result of a [`StoreClient::watch_prefix`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A change at this index; pass it as the next `wait_index`.
    Changed(u64),
    /// The cancellation token fired before any change.
    Cancelled,
}

impl WatchOutcome {
    pub fn index(&self) -> Option<u64> {
        match self {
            WatchOutcome::Changed(index) => Some(*index),
            WatchOutcome::Cancelled => None,
        }
    }
}

/// Key/value backend client.
///
/// Implementations must be thread-safe; a single client is shared by the
/// resource subsystem and every prefix watcher.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Look up `keys`.
    ///
    /// Keys with no value are absent from the returned map. Fails only if
    /// the backend itself cannot be queried.
    async fn get_values(&self, keys: &[String]) -> BackendResult<HashMap<String, String>>;

    /// Block until a change under `prefix` happens after `wait_index`.
    ///
    /// Returns promptly with [`WatchOutcome::Cancelled`] once `cancel` fires.
    async fn watch_prefix(
        &self,
        prefix: &str,
        wait_index: u64,
        cancel: &CancellationToken,
    ) -> BackendResult<WatchOutcome>;
}

/// What an adapter constructor needs to know about the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub nodes: Vec<String>,
    pub scheme: Scheme,
    pub client_ca_keys: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

impl BackendDescriptor {
    pub fn from_config(config: &Config) -> Self {
        Self {
            kind: config.backend.clone(),
            nodes: config.nodes.clone(),
            scheme: config.scheme,
            client_ca_keys: config.client_ca_keys.clone(),
            client_cert: config.client_cert.clone(),
            client_key: config.client_key.clone(),
        }
    }

    /// Node URLs, prefixing the scheme unless a node already carries one.
    pub fn endpoints(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|node| {
                if node.contains("://") {
                    node.clone()
                } else {
                    format!("{}://{}", self.scheme, node)
                }
            })
            .collect()
    }

    /// Whether any TLS client material is configured.
    pub fn uses_tls(&self) -> bool {
        self.client_ca_keys.is_some() || self.client_cert.is_some() || self.client_key.is_some()
    }
}

impl From<&Config> for BackendDescriptor {
    fn from(config: &Config) -> Self {
        Self::from_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_config() {
        let config = Config {
            backend: BackendKind::Consul,
            nodes: vec!["10.0.0.1:8500".into()],
            scheme: Scheme::Https,
            client_cert: Some(PathBuf::from("/ssl/client.pem")),
            ..Config::default()
        };
        let desc = BackendDescriptor::from(&config);
        assert_eq!(desc.kind, BackendKind::Consul);
        assert_eq!(desc.nodes, vec!["10.0.0.1:8500"]);
        assert_eq!(desc.scheme, Scheme::Https);
        assert!(desc.uses_tls());
    }

    #[test]
    fn test_endpoints_add_scheme() {
        let desc = BackendDescriptor {
            nodes: vec!["127.0.0.1:4100".into(), "https://etcd.internal:4001".into()],
            ..BackendDescriptor::from_config(&Config::default())
        };
        assert_eq!(
            desc.endpoints(),
            vec!["http://127.0.0.1:4100", "https://etcd.internal:4001"]
        );
    }

    #[test]
    fn test_watch_outcome_index() {
        assert_eq!(WatchOutcome::Changed(7).index(), Some(7));
        assert_eq!(WatchOutcome::Cancelled.index(), None);
    }
}
