//! Logging setup.
//!
//! The tracing subscriber is installed before configuration is resolved so
//! that resolution itself can log. It starts at `warn` and is switched to
//! the level derived from the resolved `quiet`/`verbose`/`debug` flags
//! through a reload handle.

use crate::config::Config;
use std::fs::OpenOptions;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Level used until the configuration has been resolved.
pub const STARTUP_LEVEL: Level = Level::WARN;

/// Where log output goes, selected with `--log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Off,
    Stdout,
    Stderr,
    File(String),
}

impl LogOutput {
    /// Parse `0`/`off`, `1`/`stdout`, `2`/`stderr`, or a file name.
    pub fn parse(value: &str) -> Self {
        match value {
            "0" | "off" => LogOutput::Off,
            "1" | "stdout" => LogOutput::Stdout,
            "2" | "stderr" => LogOutput::Stderr,
            filename => LogOutput::File(filename.to_string()),
        }
    }
}

/// Level for the resolved logging flags.
///
/// `debug` wins over `verbose`, which wins over `quiet`.
pub fn level_for(quiet: bool, verbose: bool, debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else if quiet {
        Level::ERROR
    } else {
        Level::WARN
    }
}

pub fn config_level(config: &Config) -> Level {
    level_for(config.quiet, config.verbose, config.debug)
}

/// Handle for adjusting the installed subscriber's level.
pub struct LogHandle {
    reload: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogHandle {
    /// Handle that does nothing, for `--log off`.
    pub fn disabled() -> Self {
        Self { reload: None }
    }

    /// Switch the subscriber to `level`.
    pub fn set_level(&self, level: Level) -> anyhow::Result<()> {
        if let Some(ref handle) = self.reload {
            handle.reload(filter_for(level))?;
        }
        Ok(())
    }

    /// Apply the level derived from the resolved configuration.
    pub fn apply(&self, config: &Config) -> anyhow::Result<()> {
        self.set_level(config_level(config))
    }
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::new(level.as_str().to_ascii_lowercase())
}

/// Install the global subscriber for `output`.
pub fn init(output: &LogOutput) -> anyhow::Result<LogHandle> {
    let (writer, ansi) = match output {
        LogOutput::Off => return Ok(LogHandle::disabled()),
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File(filename) => {
            // Append so restarts keep earlier output.
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
    };

    let (filter, handle) = reload::Layer::new(filter_for(STARTUP_LEVEL));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(ansi))
        .try_init()?;

    Ok(LogHandle {
        reload: Some(handle),
    })
}
