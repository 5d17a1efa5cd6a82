//! Resource definition files.
//!
//! A definition names the file to render and groups of options whose
//! values come from backend keys:
//!
//! ```toml
//! conffile = "nginx.conf"
//!
//! [[group]]
//! identifier = "upstream"
//!
//! [[group.pair]]
//! key = "server"          # option name in the rendered resource
//! value = "/nginx/host"   # backend key, relative to the prefix
//! ```

use super::ResourceConfig;
use crate::error::{ResourceError, ResourceResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Values fetched for a definition: group identifier to option to value.
pub type ResourceValues = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDefinition {
    /// File name of the rendered resource, relative to the resource directory.
    pub conffile: String,

    #[serde(default, rename = "group")]
    pub groups: Vec<Group>,

    /// File the definition was loaded from.
    #[serde(skip)]
    pub source: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Group {
    pub identifier: String,

    #[serde(default, rename = "pair")]
    pub pairs: Vec<OptionPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionPair {
    /// Option name
    pub key: String,
    /// Backend key
    pub value: String,
}

impl ResourceDefinition {
    /// Read and parse a definition file.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ResourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse definition text. `path` is recorded as the source and used in errors.
    pub fn parse(path: &Path, text: &str) -> ResourceResult<Self> {
        let invalid = |message: String| ResourceError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut definition: ResourceDefinition =
            toml::from_str(text).map_err(|e| invalid(e.to_string()))?;

        let conffile = Path::new(&definition.conffile);
        if definition.conffile.is_empty()
            || !conffile
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid(format!(
                "conffile must be a relative path inside the resource directory, got '{}'",
                definition.conffile
            )));
        }

        definition.source = path.to_path_buf();
        Ok(definition)
    }

    /// Where the rendered resource is written.
    pub fn target_path(&self, rc: &ResourceConfig) -> PathBuf {
        rc.resource_dir.join(&self.conffile)
    }

    /// Every backend key this definition reads, joined onto `prefix`.
    pub fn backend_keys(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .groups
            .iter()
            .flat_map(|g| g.pairs.iter())
            .map(|pair| join_key(prefix, &pair.value))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Fetch the definition's values through the store client.
    ///
    /// Options whose backend key has no value are left out.
    pub async fn fetch(&self, rc: &ResourceConfig) -> ResourceResult<ResourceValues> {
        let keys = self.backend_keys(&rc.prefix);
        let values = rc.store_client.get_values(&keys).await?;

        let mut result = ResourceValues::new();
        for group in &self.groups {
            let options = result.entry(group.identifier.clone()).or_default();
            for pair in &group.pairs {
                if let Some(value) = values.get(&join_key(&rc.prefix, &pair.value)) {
                    options.insert(pair.key.clone(), value.clone());
                }
            }
        }
        Ok(result)
    }
}

/// Join a backend key onto a prefix with exactly one `/` between them.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    format!("{}/{}", prefix, key)
}
