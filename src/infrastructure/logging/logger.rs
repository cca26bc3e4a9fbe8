//! Structured logging setup (ambient stack, SPEC_FULL.md "Logging").

use anyhow::Result;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::config::{LogConfig, LogFormat};

/// Guard returned by [`init`]; dropping it flushes the non-blocking file
/// writer. Hold it for the lifetime of the process.
pub struct LoggerGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init(config: &LogConfig) -> Result<LoggerGuard> {
    let default_level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let stdout_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stdout)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(io::stdout)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    };

    let file_guard = if let Some(log_dir) = &config.log_dir {
        let appender = tracing_appender::rolling::daily(log_dir, "fleet-core.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .with(file_layer)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry().with(env_filter).with(stdout_layer).init();
        None
    };

    tracing::info!(level = %config.level, format = ?config.format, file_output = config.log_dir.is_some(), "logger initialized");
    Ok(LoggerGuard { _file_guard: file_guard })
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(parse_log_level("invalid").is_err());
    }
}
