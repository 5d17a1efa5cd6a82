//! Configuration types.
//!
//! [`Config`] is the resolved, read-only settings record. [`PartialConfig`]
//! is one layer of it (the file or the command line) where every field is
//! optional and absence means "not specified".

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Built-in base directory for rendered resources and resource definitions.
pub const DEFAULT_CONFDIR: &str = "/etc/loadconfd";

/// Default backend polling interval in seconds.
pub const DEFAULT_INTERVAL: u64 = 600;

/// Default key-path prefix.
pub const DEFAULT_PREFIX: &str = "/";

/// Key/value backend kinds known to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    #[default]
    Etcd,
    Consul,
    /// Any other non-empty backend name. Resolution accepts it, but no
    /// default nodes are derived for it.
    Unsupported(String),
}

impl BackendKind {
    pub fn as_str(&self) -> &str {
        match self {
            BackendKind::Etcd => "etcd",
            BackendKind::Consul => "consul",
            BackendKind::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ConfigError::invalid("backend", "backend must not be empty")),
            "etcd" => Ok(BackendKind::Etcd),
            "consul" => Ok(BackendKind::Consul),
            other => Ok(BackendKind::Unsupported(other.to_string())),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_str().to_string()
    }
}

/// URI scheme used to reach backend nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(ConfigError::invalid(
                "scheme",
                format!("expected 'http' or 'https', got '{}'", other),
            )),
        }
    }
}

/// Resolved daemon configuration.
///
/// Built once by [`ConfigResolver`](super::ConfigResolver) and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Backend to synchronize from.
    pub backend: BackendKind,

    /// Backend node addresses, in the order they were configured.
    pub nodes: Vec<String>,

    /// CA bundle used to verify backend nodes.
    #[serde(rename = "client_cakeys")]
    pub client_ca_keys: Option<PathBuf>,

    /// Client certificate presented to backend nodes.
    pub client_cert: Option<PathBuf>,

    /// Private key for `client_cert`.
    pub client_key: Option<PathBuf>,

    /// Base directory for resource definitions and rendered resources.
    pub confdir: PathBuf,

    /// Backend polling interval in seconds.
    pub interval: u64,

    /// Key-path prefix applied to every lookup and watch.
    pub prefix: String,

    pub scheme: Scheme,

    pub quiet: bool,
    pub verbose: bool,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            nodes: Vec::new(),
            client_ca_keys: None,
            client_cert: None,
            client_key: None,
            confdir: PathBuf::from(DEFAULT_CONFDIR),
            interval: DEFAULT_INTERVAL,
            prefix: DEFAULT_PREFIX.to_string(),
            scheme: Scheme::default(),
            quiet: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Check the invariants the merged layers cannot express on their own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.as_str().is_empty() {
            return Err(ConfigError::invalid("backend", "backend must not be empty"));
        }
        if self.interval == 0 {
            return Err(ConfigError::invalid("interval", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Keys a config file may set. Anything else is ignored with a warning.
pub const FILE_KEYS: &[&str] = &[
    "backend",
    "backends",
    "client_cakeys",
    "client_cert",
    "client_key",
    "confdir",
    "debug",
    "interval",
    "nodes",
    "prefix",
    "quiet",
    "scheme",
    "verbose",
];

/// One configuration layer. `None` fields leave the lower layer untouched.
///
/// Unknown keys are dropped on deserialization so that files carrying
/// settings for other tools still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialConfig {
    /// Older files spell this key `backends`.
    #[serde(default, alias = "backends", skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<String>>,

    #[serde(
        default,
        rename = "client_cakeys",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_ca_keys: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confdir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

impl PartialConfig {
    pub fn is_empty(&self) -> bool {
        *self == PartialConfig::default()
    }
}
