// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::writers::FileWriter;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding an `EnvFilter` directive that overrides the configured level.
pub const LOG_ENV_VAR: &str = "MEMTRACE_LOG";

/// Log level for filtering log events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogEventLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,
    /// Designates lower priority information.
    Debug,
    /// Designates useful information.
    #[default]
    Info,
    /// Designates hazardous situations.
    Warn,
    /// Designates very serious errors.
    Error,
}

impl From<LogEventLevel> for LevelFilter {
    fn from(level: LogEventLevel) -> Self {
        match level {
            LogEventLevel::Trace => LevelFilter::TRACE,
            LogEventLevel::Debug => LevelFilter::DEBUG,
            LogEventLevel::Info => LevelFilter::INFO,
            LogEventLevel::Warn => LevelFilter::WARN,
            LogEventLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogEventLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogEventLevel::Trace),
            "debug" => Ok(LogEventLevel::Debug),
            "info" => Ok(LogEventLevel::Info),
            "warn" | "warning" => Ok(LogEventLevel::Warn),
            "error" => Ok(LogEventLevel::Error),
            _ => Err(LoggerError::InvalidLevel(s.to_owned())),
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    Stdout,
    #[default]
    Stderr,
    /// JSON lines appended to a file through a background writer.
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    pub level: LogEventLevel,
    pub target: LogTarget,
}

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("a global logger is already installed")]
    AlreadyInitialized,

    #[error("failed to open log file: {0}")]
    Io(#[from] io::Error),
}

/// Keeps the background log writer alive. Pending lines are flushed when it is dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggerGuard {
    _worker: Option<WorkerGuard>,
}

fn env_filter(level: LogEventLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(LevelFilter::from(level).to_string().to_lowercase()))
}

/// Builds a subscriber for `config` without installing it.
pub fn build_subscriber(
    config: &LoggerConfig,
) -> Result<(Box<dyn Subscriber + Send + Sync>, LoggerGuard), LoggerError> {
    let registry = tracing_subscriber::registry().with(env_filter(config.level));
    let mut worker = None;
    let subscriber: Box<dyn Subscriber + Send + Sync> = match &config.target {
        LogTarget::Stdout => Box::new(
            registry.with(
                fmt::layer()
                    .compact()
                    .with_writer(io::stdout)
                    .with_target(true)
                    .with_ansi(false),
            ),
        ),
        LogTarget::Stderr => Box::new(
            registry.with(
                fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_ansi(false),
            ),
        ),
        LogTarget::File(path) => {
            let (writer, guard) = FileWriter::new(path)?;
            worker = Some(guard);
            Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_ansi(false),
                ),
            )
        }
    };
    Ok((subscriber, LoggerGuard { _worker: worker }))
}

/// Installs the process-wide subscriber.
///
/// Can only succeed once per process.
pub fn init_logger(config: &LoggerConfig) -> Result<LoggerGuard, LoggerError> {
    let (subscriber, guard) = build_subscriber(config)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| LoggerError::AlreadyInitialized)?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, warn};

    fn json_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn parses_levels() {
        assert_eq!("TRACE".parse::<LogEventLevel>().unwrap(), LogEventLevel::Trace);
        assert_eq!("warning".parse::<LogEventLevel>().unwrap(), LogEventLevel::Warn);
        assert_eq!("error".parse::<LogEventLevel>().unwrap(), LogEventLevel::Error);
        assert!(matches!(
            "loud".parse::<LogEventLevel>(),
            Err(LoggerError::InvalidLevel(s)) if s == "loud"
        ));
    }

    #[test]
    fn level_filters() {
        assert_eq!(LevelFilter::from(LogEventLevel::Debug), LevelFilter::DEBUG);
        assert_eq!(LevelFilter::from(LogEventLevel::default()), LevelFilter::INFO);
        assert!(LogEventLevel::Trace < LogEventLevel::Error);
    }

    #[test]
    fn file_target_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memtrace.log");
        let config = LoggerConfig {
            level: LogEventLevel::Info,
            target: LogTarget::File(path.clone()),
        };
        let (subscriber, guard) = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden");
            info!(records = 3, "replayed");
            warn!("truncated");
        });
        drop(guard);

        let lines = json_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "INFO");
        assert_eq!(lines[0]["fields"]["message"], "replayed");
        assert_eq!(lines[0]["fields"]["records"], 3);
        assert_eq!(lines[1]["level"], "WARN");
    }

    #[test]
    fn higher_level_drops_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memtrace.log");
        let config = LoggerConfig {
            level: LogEventLevel::Error,
            target: LogTarget::File(path.clone()),
        };
        let (subscriber, guard) = build_subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            info!("quiet");
            warn!("also quiet");
        });
        drop(guard);
        assert!(json_lines(&path).is_empty());
    }

    #[test]
    fn unwritable_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let config = LoggerConfig {
            level: LogEventLevel::Info,
            target: LogTarget::File(blocker.join("nested.log")),
        };
        assert!(matches!(
            build_subscriber(&config),
            Err(LoggerError::Io(_))
        ));
    }
}
