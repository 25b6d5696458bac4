//! Logging system for keyward.
//!
//! Diagnostics go to stderr, filtered by `RUST_LOG` (default
//! `keyward=info`). Additional file destinations with their own level and
//! format can be configured in the tool settings.

use keyward_types::{KeywardError, LogLevel, Result};
use std::fs;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LogConfig, LogFormat};
use crate::util::fs::expand_path;

/// Filter applied when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "keyward=info";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the logging system with default configuration.
pub fn init_default() -> Result<()> {
    init_from_config(&[])
}

/// Initialize logging to stderr plus every configured file destination.
pub fn init_from_config(configs: &[LogConfig]) -> Result<()> {
    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(DEFAULT_FILTER)];
    for config in configs {
        layers.push(file_layer(config)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| KeywardError::Config(format!("Failed to initialize logging: {}", e)))
}

fn stderr_layer(default_filter: &str) -> BoxedLayer {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter)
        .boxed()
}

fn file_layer(config: &LogConfig) -> Result<BoxedLayer> {
    let path = expand_path(&config.path);
    let (dir, name) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_owned()),
        _ => {
            return Err(KeywardError::Config(format!(
                "Invalid log path '{}'",
                config.path
            )))
        }
    };
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(&dir)?;
    }

    let writer = tracing_appender::rolling::never(dir, name);
    let level = level_filter(config.level);
    let layer = fmt::layer().with_writer(writer).with_ansi(false);

    Ok(match config.format {
        LogFormat::Pretty => layer.pretty().with_filter(level).boxed(),
        LogFormat::Compact => layer.compact().with_filter(level).boxed(),
        LogFormat::Json => layer.json().with_filter(level).boxed(),
    })
}

/// Map a configured log level to a tracing filter.
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::None => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_mapping() {
        assert_eq!(level_filter(LogLevel::None), LevelFilter::OFF);
        assert_eq!(level_filter(LogLevel::Warn), LevelFilter::WARN);
        assert!(level_filter(LogLevel::Trace) > level_filter(LogLevel::Debug));
    }

    #[test]
    fn test_file_layer_rejects_bare_root() {
        let config = LogConfig {
            path: "/".to_string(),
            level: LogLevel::Info,
            format: LogFormat::Json,
        };
        assert!(file_layer(&config).is_err());
    }
}
