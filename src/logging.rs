use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::config::{AppConfig, Rotation};

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process when file logging is enabled.
pub fn init_logging(config: &AppConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    let stdout_layer = if config.use_json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(false).with_ansi(true).boxed()
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = match config.rotation {
                Rotation::Hourly => tracing_appender::rolling::hourly(dir, &config.log_file),
                Rotation::Daily => tracing_appender::rolling::daily(dir, &config.log_file),
                Rotation::Never => tracing_appender::rolling::never(dir, &config.log_file),
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = if config.use_json {
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .boxed()
            } else {
                fmt::layer()
                    .with_target(false)
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}
