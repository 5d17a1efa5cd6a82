//! Layered configuration resolution.
//!
//! Builds the [`Config`] from defaults, then the config file, then the flags
//! the user supplied, and finally derives backend nodes if no layer set any.

use super::flags::SuppliedFlags;
use super::merge::merge_layer;
use super::nodes::{ETCD_PEERS_ENV, default_nodes, peers_from_env};
use super::types::{Config, FILE_KEYS, PartialConfig};
use crate::error::{ConfigError, ConfigResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::env::VarError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Config file looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "etc/loadconfd/loadconfd.toml";

/// System-wide config file.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/loadconfd/loadconfd.toml";

/// Layer that last set a configuration field (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigLayer {
    /// Built-in defaults
    Defaults,
    /// The config file
    File,
    /// Flags supplied on the command line
    Flags,
    /// Derived from `ETCDCTL_PEERS`
    Environment,
}

impl std::fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLayer::Defaults => write!(f, "defaults"),
            ConfigLayer::File => write!(f, "file"),
            ConfigLayer::Flags => write!(f, "flags"),
            ConfigLayer::Environment => write!(f, "environment"),
        }
    }
}

/// Config file syntax, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Yaml,
}

impl FileFormat {
    /// `.yaml` and `.yml` are YAML; everything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => FileFormat::Toml,
        }
    }
}

/// Raw contents of a config file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl ConfigFile {
    /// Read a config file from disk.
    pub fn read(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, bytes })
    }

    /// Wrap bytes already in memory. `path` only labels errors and picks the format.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        FileFormat::from_path(&self.path)
    }

    /// Parse the file into a configuration layer.
    ///
    /// Top-level keys loadconfd does not know are logged and skipped.
    pub fn parse(&self) -> ConfigResult<PartialConfig> {
        let label = self.path.display().to_string();
        let text =
            std::str::from_utf8(&self.bytes).map_err(|e| ConfigError::parse(label.clone(), e))?;

        let layer: PartialConfig = match self.format() {
            FileFormat::Toml => toml::from_str(text).map_err(|e| ConfigError::parse(&label, e))?,
            FileFormat::Yaml => {
                if text.trim().is_empty() {
                    return Ok(PartialConfig::default());
                }
                serde_yaml::from_str(text).map_err(|e| ConfigError::parse(&label, e))?
            }
        };

        for key in ignored_keys(self.format(), text) {
            warn!(path = %label, key = %key, "Ignoring unknown config file key");
        }
        Ok(layer)
    }

    /// Top-level keys in the file that no configuration field reads.
    pub fn ignored_keys(&self) -> Vec<String> {
        match std::str::from_utf8(&self.bytes) {
            Ok(text) => ignored_keys(self.format(), text),
            Err(_) => Vec::new(),
        }
    }
}

/// Where to look for the config file.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Path given with `--config-file`
    pub explicit: Option<PathBuf>,
    /// Well-known locations, tried in order when no explicit path is given
    pub candidates: Vec<PathBuf>,
}

impl ConfigPaths {
    /// Standard search locations plus an optional explicit path.
    pub fn discover(explicit: Option<PathBuf>) -> Self {
        let mut candidates = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("loadconfd").join("loadconfd.toml"));
        }
        candidates.push(PathBuf::from(SYSTEM_CONFIG_FILE));
        Self {
            explicit,
            candidates,
        }
    }

    pub fn with_candidates(explicit: Option<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self {
            explicit,
            candidates,
        }
    }

    /// The explicit path, or the first candidate that exists.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.explicit {
            return Some(path.clone());
        }
        self.candidates.iter().find(|p| p.exists()).cloned()
    }

    /// Read the located config file, if any.
    pub fn load(&self) -> ConfigResult<Option<ConfigFile>> {
        self.locate().map(ConfigFile::read).transpose()
    }
}

/// Outcome of a resolution: the configuration and where each field came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    config: Config,
    config_path: Option<PathBuf>,
    sources: BTreeMap<String, ConfigLayer>,
}

impl ResolvedConfig {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// The config file that was applied, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Layer that last set `field` (file key spelling, e.g. `client_cakeys`).
    pub fn source_of(&self, field: &str) -> Option<ConfigLayer> {
        self.sources.get(field).copied()
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, ConfigLayer)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Resolves defaults, file and flags into one [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    env_peers: Option<String>,
}

impl ConfigResolver {
    /// Resolver reading the etcd peer list from `ETCDCTL_PEERS`.
    ///
    /// A value that is not valid UTF-8 is an error rather than "unset".
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_env_var(std::env::var(ETCD_PEERS_ENV))
    }

    fn from_env_var(var: Result<String, VarError>) -> ConfigResult<Self> {
        let env_peers = match var {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => None,
            Err(VarError::NotUnicode(_)) => {
                return Err(ConfigError::invalid(
                    ETCD_PEERS_ENV,
                    "environment value is not valid UTF-8",
                ));
            }
        };
        Ok(Self { env_peers })
    }

    /// Resolver with an explicit etcd peer list value.
    pub fn with_env_peers(env_peers: Option<String>) -> Self {
        Self { env_peers }
    }

    /// Locate and read the config file, then resolve.
    pub fn load(&self, paths: &ConfigPaths, flags: &SuppliedFlags) -> ConfigResult<ResolvedConfig> {
        let file = paths.load()?;
        self.resolve(file.as_ref(), flags)
    }

    /// Resolve the configuration.
    ///
    /// Precedence, low to high: defaults, `file`, `flags`. Backend nodes are
    /// derived from the backend kind only if no layer set them.
    pub fn resolve(
        &self,
        file: Option<&ConfigFile>,
        flags: &SuppliedFlags,
    ) -> ConfigResult<ResolvedConfig> {
        let mut merged = to_tree(&Config::default())?;
        let mut sources = BTreeMap::new();
        if let Value::Object(ref map) = merged {
            for key in map.keys() {
                sources.insert(key.clone(), ConfigLayer::Defaults);
            }
        }

        match file {
            Some(file) => {
                debug!(path = %file.path().display(), "Loading config file");
                let layer = file.parse()?;
                for key in merge_layer(&mut merged, to_tree(&layer)?) {
                    sources.insert(key, ConfigLayer::File);
                }
            }
            None => warn!("Skipping loadconfd config file"),
        }

        let flag_layer = flags.to_layer()?;
        for key in merge_layer(&mut merged, to_tree(&flag_layer)?) {
            sources.insert(key, ConfigLayer::Flags);
        }

        let mut config: Config = serde_json::from_value(merged)
            .map_err(|e| ConfigError::invalid("config", e.to_string()))?;

        if config.nodes.is_empty() {
            let env_peers = self.env_peers.as_deref();
            config.nodes = default_nodes(&config.backend, env_peers);
            let layer = if peers_from_env(&config.backend, env_peers) {
                ConfigLayer::Environment
            } else {
                ConfigLayer::Defaults
            };
            sources.insert("nodes".to_string(), layer);
            debug!(
                backend = %config.backend,
                nodes = ?config.nodes,
                source = %layer,
                "Derived default backend nodes"
            );
        }

        config.validate()?;

        Ok(ResolvedConfig {
            config,
            config_path: file.map(|f| f.path().to_path_buf()),
            sources,
        })
    }
}

fn ignored_keys(format: FileFormat, text: &str) -> Vec<String> {
    let keys: Vec<String> = match format {
        FileFormat::Toml => toml::from_str::<toml::Table>(text)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default(),
        FileFormat::Yaml => serde_yaml::from_str::<serde_yaml::Mapping>(text)
            .map(|map| {
                map.keys()
                    .filter_map(|k| k.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default(),
    };
    keys.into_iter()
        .filter(|key| !FILE_KEYS.contains(&key.as_str()))
        .collect()
}

fn to_tree<T: Serialize>(value: &T) -> ConfigResult<Value> {
    serde_json::to_value(value).map_err(|e| ConfigError::invalid("config", e.to_string()))
}
