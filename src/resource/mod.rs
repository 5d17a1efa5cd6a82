//! Resource subsystem configuration.
//!
//! [`ResourceConfig`] is derived from the resolved [`Config`] once a store
//! client exists. Resource definitions live in `<confdir>/conf.d`; rendered
//! resources are written under `<confdir>/configurations`.

mod definition;

pub use definition::{Group, OptionPair, ResourceDefinition, ResourceValues, join_key};

use crate::backends::StoreClient;
use crate::config::Config;
use crate::error::{ResourceError, ResourceResult};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sub-directory of `confdir` holding resource definitions.
pub const CONFIG_SUBDIR: &str = "conf.d";

/// Sub-directory of `confdir` receiving rendered resources.
pub const RESOURCE_SUBDIR: &str = "configurations";

/// Paths and backend access for the resource subsystem.
///
/// The store client is shared with its owner; dropping a `ResourceConfig`
/// does not shut the client down.
#[derive(Clone)]
pub struct ResourceConfig {
    pub confdir: PathBuf,
    /// `confdir/conf.d`
    pub config_dir: PathBuf,
    /// `confdir/configurations`
    pub resource_dir: PathBuf,
    pub prefix: String,
    pub store_client: Arc<dyn StoreClient>,
}

impl ResourceConfig {
    /// Derive the resource paths from `config`. No validation happens here.
    pub fn build(config: &Config, store_client: Arc<dyn StoreClient>) -> Self {
        Self {
            confdir: config.confdir.clone(),
            config_dir: config.confdir.join(CONFIG_SUBDIR),
            resource_dir: config.confdir.join(RESOURCE_SUBDIR),
            prefix: config.prefix.clone(),
            store_client,
        }
    }

    /// Load every `*.toml` definition in `config_dir`, ordered by file name.
    ///
    /// A missing `config_dir` yields no definitions.
    pub fn load_definitions(&self) -> ResourceResult<Vec<ResourceDefinition>> {
        if !self.config_dir.exists() {
            warn!(
                "Resource definition directory does not exist: {}",
                self.config_dir.display()
            );
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.config_dir).map_err(|source| ResourceError::Read {
            path: self.config_dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ResourceError::Read {
                path: self.config_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut definitions = Vec::with_capacity(paths.len());
        for path in paths {
            debug!("Loading resource definition {}", path.display());
            definitions.push(ResourceDefinition::load(&path)?);
        }
        Ok(definitions)
    }
}

impl fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("confdir", &self.confdir)
            .field("config_dir", &self.config_dir)
            .field("resource_dir", &self.resource_dir)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
