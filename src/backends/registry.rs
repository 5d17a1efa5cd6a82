//! Store client factory keyed by backend kind.
//!
//! Adapters register a constructor under their backend name; the daemon
//! asks the registry for a client matching the resolved descriptor.

use super::{BackendDescriptor, StoreClient};
use crate::error::{BackendError, BackendResult};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a client from a validated descriptor.
pub type StoreClientConstructor =
    Box<dyn Fn(&BackendDescriptor) -> BackendResult<Arc<dyn StoreClient>> + Send + Sync>;

/// Registered adapter constructors.
#[derive(Default)]
pub struct StoreClientRegistry {
    constructors: HashMap<String, StoreClientConstructor>,
}

impl StoreClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` for backend `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&BackendDescriptor) -> BackendResult<Arc<dyn StoreClient>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(backend = %name, "Registered store client constructor");
        self.constructors.insert(name, Box::new(constructor));
    }

    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&BackendDescriptor) -> BackendResult<Arc<dyn StoreClient>> + Send + Sync + 'static,
    {
        self.register(name, constructor);
        self
    }

    pub fn supports(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that a client could be built for `desc` without building one.
    ///
    /// Fails on an empty node list or on TLS paths that do not exist.
    pub fn validate(desc: &BackendDescriptor) -> BackendResult<()> {
        if desc.nodes.is_empty() {
            return Err(BackendError::NoNodes(desc.kind.to_string()));
        }
        for (what, path) in [
            ("client CA keys", &desc.client_ca_keys),
            ("client cert", &desc.client_cert),
            ("client key", &desc.client_key),
        ] {
            if let Some(path) = path {
                check_tls_file(what, path)?;
            }
        }
        if desc.client_cert.is_some() != desc.client_key.is_some() {
            return Err(BackendError::Tls(
                "client cert and client key must be configured together".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the client for `desc`.
    pub fn build(&self, desc: &BackendDescriptor) -> BackendResult<Arc<dyn StoreClient>> {
        Self::validate(desc)?;
        let constructor = self
            .constructors
            .get(desc.kind.as_str())
            .ok_or_else(|| BackendError::UnsupportedBackend(desc.kind.to_string()))?;
        let client = constructor(desc)?;
        info!(
            backend = %desc.kind,
            endpoints = ?desc.endpoints(),
            tls = desc.uses_tls(),
            "Store client ready"
        );
        Ok(client)
    }
}

impl fmt::Debug for StoreClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClientRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}

fn check_tls_file(what: &str, path: &Path) -> BackendResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BackendError::Tls(format!(
            "{} file not found: {}",
            what,
            path.display()
        )))
    }
}
