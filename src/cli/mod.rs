//! CLI definitions for loadconfd.
//!
//! Every configuration field has a flag with a built-in default, but only
//! flags the user actually passes reach the resolver. [`Cli::supplied_flags`]
//! uses clap's value source to tell the two apart.

use crate::config::{BackendKind, FlagValue, Scheme, SuppliedFlags};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Keeps local configuration files in sync with a key/value backend
#[derive(Parser, Debug)]
#[command(name = "loadconfd", version, about, long_about = None)]
pub struct Cli {
    /// Backend to use
    #[arg(long, default_value = "etcd")]
    pub backend: BackendKind,

    /// Client CA keys
    #[arg(long = "client-ca-keys")]
    pub client_ca_keys: Option<PathBuf>,

    /// The client cert
    #[arg(long)]
    pub client_cert: Option<PathBuf>,

    /// The client key
    #[arg(long)]
    pub client_key: Option<PathBuf>,

    /// loadconfd conf directory
    #[arg(long, default_value = "/etc/loadconfd")]
    pub confdir: PathBuf,

    /// The loadconfd config file
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Backend polling interval in seconds
    #[arg(long, default_value_t = 600)]
    pub interval: u64,

    /// Backend node (repeat for several)
    #[arg(long = "node")]
    pub nodes: Vec<String>,

    /// Key path prefix
    #[arg(long, default_value = "/")]
    pub prefix: String,

    /// Enable quiet logging
    #[arg(long)]
    pub quiet: bool,

    /// The backend URI scheme (http or https)
    #[arg(long, default_value = "http")]
    pub scheme: Scheme,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2")]
    pub log: String,
}

impl Cli {
    /// Parse `args`, returning the matches alongside the typed values.
    pub fn try_parse_with_matches<I, T>(args: I) -> Result<(Self, ArgMatches), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let cli = Self::from_arg_matches(&matches)?;
        Ok((cli, matches))
    }

    /// Parse the process arguments, exiting on `--help`, `--version`, or a usage error.
    pub fn parse_with_matches() -> (Self, ArgMatches) {
        let matches = Self::command().get_matches();
        match Self::from_arg_matches(&matches) {
            Ok(cli) => (cli, matches),
            Err(e) => e.exit(),
        }
    }

    /// Flags the user passed on the command line, keyed by flag name.
    pub fn supplied_flags(&self, matches: &ArgMatches) -> SuppliedFlags {
        let supplied = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
        let mut flags = SuppliedFlags::new();

        if supplied("backend") {
            flags.insert("backend", FlagValue::Text(self.backend.to_string()));
        }
        if supplied("client_ca_keys")
            && let Some(ref path) = self.client_ca_keys
        {
            flags.insert("client-ca-keys", FlagValue::Path(path.clone()));
        }
        if supplied("client_cert")
            && let Some(ref path) = self.client_cert
        {
            flags.insert("client-cert", FlagValue::Path(path.clone()));
        }
        if supplied("client_key")
            && let Some(ref path) = self.client_key
        {
            flags.insert("client-key", FlagValue::Path(path.clone()));
        }
        if supplied("confdir") {
            flags.insert("confdir", FlagValue::Path(self.confdir.clone()));
        }
        if supplied("debug") {
            flags.insert("debug", FlagValue::Switch(self.debug));
        }
        if supplied("interval") {
            flags.insert("interval", FlagValue::Number(self.interval));
        }
        if supplied("nodes") {
            flags.insert("node", FlagValue::List(self.nodes.clone()));
        }
        if supplied("prefix") {
            flags.insert("prefix", FlagValue::Text(self.prefix.clone()));
        }
        if supplied("quiet") {
            flags.insert("quiet", FlagValue::Switch(self.quiet));
        }
        if supplied("scheme") {
            flags.insert("scheme", FlagValue::Text(self.scheme.to_string()));
        }
        if supplied("verbose") {
            flags.insert("verbose", FlagValue::Switch(self.verbose));
        }
        flags
    }
}
