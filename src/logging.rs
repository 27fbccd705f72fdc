use crate::config::LoggingConfig;
use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "abn_ingest=info";

/// Initializes logging: console output plus, when enabled, a daily-rolling JSON file.
///
/// `RUST_LOG` overrides the default `abn_ingest=info` filter.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let file_layer = if config.file_output {
        let _ = fs::create_dir_all(&config.directory);
        let file_appender = tracing_appender::rolling::daily(&config.directory, &config.file_name);
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        // Flushes on drop, so it has to outlive main
        std::mem::forget(guard);
        Some(fmt::layer().json().with_writer(non_blocking_writer))
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();
}
