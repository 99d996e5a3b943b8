//! Tracing subscriber setup from the `logging` settings.
//!
//! Console sinks write to stderr. `RUST_LOG` overrides every sink's level when
//! set.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::error::SettingsError;
use crate::schedule::settings::{LogLevel, LogSink};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub fn init(sinks: &[LogSink]) -> Result<(), SettingsError> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(sinks.len());
    for sink in sinks {
        match sink {
            LogSink::Console { level } => layers.push(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(filter_for(*level))
                    .boxed(),
            ),
            LogSink::File { level, path } => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| SettingsError::LogFile {
                        path: path.clone(),
                        source,
                    })?;
                layers.push(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file))
                        .with_filter(filter_for(*level))
                        .boxed(),
                );
            }
        }
    }

    // already initialised is fine, tests install their own subscriber
    let _ = tracing_subscriber::registry().with(layers).try_init();
    Ok(())
}

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(level)))
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_directives() {
        assert_eq!(level_directive(LogLevel::Debug), "debug");
        assert_eq!(level_directive(LogLevel::Warn), "warn");
    }

    #[test]
    fn unwritable_log_file_is_reported() {
        let sinks = vec![LogSink::File {
            level: LogLevel::Info,
            path: "/nonexistent/dir/drip.log".to_string(),
        }];
        assert!(matches!(init(&sinks), Err(SettingsError::LogFile { .. })));
    }
}
