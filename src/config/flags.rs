//! Command-line overrides.
//!
//! Only flags the user actually passed end up here; a flag left at its
//! built-in default must never clobber a value from the config file.

use super::types::PartialConfig;
use crate::error::{ConfigError, ConfigResult};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Value carried by one supplied flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Text(String),
    Path(PathBuf),
    Number(u64),
    Switch(bool),
    List(Vec<String>),
}

/// Flags explicitly supplied on the command line, keyed by flag name.
///
/// Iteration is lexicographic by name so the same command line always
/// produces the same override pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppliedFlags {
    values: BTreeMap<String, FlagValue>,
}

impl SuppliedFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a supplied flag. A repeated name replaces the earlier value.
    pub fn insert(&mut self, name: impl Into<String>, value: FlagValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: FlagValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Convert the supplied flags into a configuration layer.
    ///
    /// Each flag sets exactly one field. Flags with no configuration
    /// counterpart (`config-file`, `log`, `version`) are skipped.
    pub fn to_layer(&self) -> ConfigResult<PartialConfig> {
        let mut layer = PartialConfig::default();
        for (name, value) in &self.values {
            match name.as_str() {
                "backend" => layer.backend = Some(text(name, value)?.parse()?),
                "client-ca-keys" => layer.client_ca_keys = Some(path(name, value)?),
                "client-cert" => layer.client_cert = Some(path(name, value)?),
                "client-key" => layer.client_key = Some(path(name, value)?),
                "confdir" => layer.confdir = Some(path(name, value)?),
                "debug" => layer.debug = Some(switch(name, value)?),
                "interval" => layer.interval = Some(number(name, value)?),
                "node" => layer.nodes = Some(list(name, value)?),
                "prefix" => layer.prefix = Some(text(name, value)?.to_string()),
                "quiet" => layer.quiet = Some(switch(name, value)?),
                "scheme" => layer.scheme = Some(text(name, value)?.parse()?),
                "verbose" => layer.verbose = Some(switch(name, value)?),
                "config-file" | "log" | "version" => {}
                other => {
                    return Err(ConfigError::invalid(other, "unknown flag"));
                }
            }
        }
        Ok(layer)
    }
}

fn mismatch(name: &str, expected: &str) -> ConfigError {
    ConfigError::invalid(name, format!("expected a {} value", expected))
}

fn text<'a>(name: &str, value: &'a FlagValue) -> ConfigResult<&'a str> {
    match value {
        FlagValue::Text(s) => Ok(s),
        _ => Err(mismatch(name, "text")),
    }
}

fn path(name: &str, value: &FlagValue) -> ConfigResult<PathBuf> {
    match value {
        FlagValue::Path(p) => Ok(p.clone()),
        FlagValue::Text(s) => Ok(PathBuf::from(s)),
        _ => Err(mismatch(name, "path")),
    }
}

fn number(name: &str, value: &FlagValue) -> ConfigResult<u64> {
    match value {
        FlagValue::Number(n) => Ok(*n),
        _ => Err(mismatch(name, "numeric")),
    }
}

fn switch(name: &str, value: &FlagValue) -> ConfigResult<bool> {
    match value {
        FlagValue::Switch(b) => Ok(*b),
        _ => Err(mismatch(name, "boolean")),
    }
}

fn list(name: &str, value: &FlagValue) -> ConfigResult<Vec<String>> {
    match value {
        FlagValue::List(items) => Ok(items.clone()),
        FlagValue::Text(s) => Ok(vec![s.clone()]),
        _ => Err(mismatch(name, "list")),
    }
}
