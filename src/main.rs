//! loadconfd
//!
//! Resolves the daemon configuration from defaults, the config file and the
//! command line, checks that a backend client could be built from it, and
//! prints the resolved configuration.

use anyhow::{Context, Result};
use clap::ArgMatches;
use loadconfd::backends::{BackendDescriptor, StoreClientRegistry};
use loadconfd::cli::Cli;
use loadconfd::config::{ConfigPaths, ConfigResolver};
use loadconfd::logging::{self, LogHandle, LogOutput};
use std::process::ExitCode;
use tracing::{debug, error, info};

fn main() -> ExitCode {
    // Exits here on --version and --help, before any resolution.
    let (cli, matches) = Cli::parse_with_matches();

    let output = LogOutput::parse(&cli.log);
    let log = match logging::init(&output) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("loadconfd: failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &matches, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if output == LogOutput::Off {
                eprintln!("loadconfd: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, matches: &ArgMatches, log: &LogHandle) -> Result<()> {
    let flags = cli.supplied_flags(matches);
    debug!(flags = ?flags.names().collect::<Vec<_>>(), "Command-line overrides");

    let paths = ConfigPaths::discover(cli.config_file.clone());
    let resolved = ConfigResolver::from_env()
        .and_then(|resolver| resolver.load(&paths, &flags))
        .context("failed to resolve configuration")?;

    log.apply(resolved.config())?;

    if let Some(path) = resolved.config_path() {
        info!("Loaded config file {}", path.display());
    }
    for (name, layer) in resolved.sources() {
        debug!(field = name, source = %layer, "Resolved config field");
    }

    let config = resolved.into_config();
    let descriptor = BackendDescriptor::from_config(&config);
    StoreClientRegistry::validate(&descriptor).context("invalid backend configuration")?;

    info!(
        backend = %config.backend,
        nodes = ?config.nodes,
        confdir = %config.confdir.display(),
        interval = config.interval,
        "Configuration resolved"
    );

    print!("{}", toml::to_string(&config)?);
    Ok(())
}
