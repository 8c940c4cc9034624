use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Settings, project_dirs};

/// Environment variable that overrides the configured log filter
pub const LOG_ENV: &str = "RPI_FORMATTER_LOG";

const LOG_FILE_PREFIX: &str = "rpi-formatter.log";

fn env_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: stderr plus a daily rolling file in the data
/// directory. The returned guard flushes the file writer and must be kept alive.
pub fn init(settings: &Settings) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let log_dir = project_dirs().map(|dirs| dirs.data_local_dir().join("logs"));
    let file_writer = log_dir.as_ref().and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        Some(tracing_appender::non_blocking(
            tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX),
        ))
    });

    match file_writer {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(env_filter(settings))
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter(settings))
                .with(stderr_layer)
                .init();
            warn!("No log directory available, logging to stderr only");
            None
        }
    }
}
