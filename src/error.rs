//! Error types for configuration resolution and backend access.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while resolving the configuration.
///
/// Any of these aborts startup; nothing falls back to defaults once a
/// layer has failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not a valid document.
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    /// A field holds a value outside its allowed range.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn parse(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by a [`StoreClient`](crate::backends::StoreClient).
///
/// Cancellation of a watch is not an error; see
/// [`WatchOutcome::Cancelled`](crate::backends::WatchOutcome::Cancelled).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with something the adapter could not use.
    #[error("backend protocol error: {0}")]
    Protocol(String),

    /// A client was requested for a descriptor with no nodes.
    #[error("no nodes configured for backend '{0}'")]
    NoNodes(String),

    /// No adapter is registered for the backend kind.
    #[error("unsupported backend '{0}'")]
    UnsupportedBackend(String),

    /// TLS material was configured but is unusable.
    #[error("tls: {0}")]
    Tls(String),
}

/// Errors raised while loading resource definitions or their values.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A definition file or the definitions directory could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A definition file is malformed.
    #[error("invalid resource definition {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
