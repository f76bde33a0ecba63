//! Tracing bootstrap.
//!
//! The engine only emits `tracing` events; embedders that install their own
//! subscriber can ignore this module. [`init_logging`] builds one from the
//! [`LoggingConfig`] section of the engine configuration: a filter (the
//! `RUST_LOG` environment variable wins over the configured one, so a
//! deployment can be debugged without touching its config file), a pretty
//! or JSON formatter, and stderr or file output.

use std::fs::OpenOptions;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Output format of the bootstrap subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable output for development.
    Pretty,
    /// Structured output for production log pipelines.
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown log format '{other}' (expected 'pretty' or 'json')"
            ))),
        }
    }
}

/// Parses the configured filter. Full env-filter directive syntax is
/// accepted, so `level` can be as simple as `info` or as specific as
/// `warn,mediasync_core=debug`.
fn parse_filter(configured: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(configured).map_err(|err| {
        Error::InvalidInput(format!("invalid log filter '{configured}': {err}"))
    })
}

fn build_filter(configured: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(from_env) => Ok(from_env),
        Err(_) => parse_filter(configured),
    }
}

fn build_writer(file_path: Option<&str>) -> Result<BoxMakeWriter> {
    let Some(path) = file_path else {
        return Ok(BoxMakeWriter::new(io::stderr));
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            Error::InvalidInput(format!("cannot open log file '{path}': {err}"))
        })?;
    Ok(BoxMakeWriter::new(Arc::new(file)))
}

/// Installs the global subscriber described by `config`.
///
/// Fails if the configuration is invalid or another subscriber is already
/// installed (e.g. when called twice).
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;
    let format: LogFormat = config.format.parse()?;
    let writer = build_writer(config.file_path.as_deref())?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(writer))
            .try_init(),
    }
    .map_err(|err| Error::Internal(format!("cannot install subscriber: {err}")))
}
