//! Tracing subscriber setup
//!
//! Logs go to stderr (warnings by default) and to `goenv.log` in the data
//! directory. Both honour `GOENV_LOG` as an `EnvFilter` directive.

use std::path::Path;

use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const LOG_ENV: &str = "GOENV_LOG";

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
///
/// When the log file cannot be opened only the stderr layer is installed and
/// no guard is returned.
pub fn init(log_path: &Path) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(env_filter("warn"));

    let (file_layer, guard, file_error) = match file_writer(log_path) {
        Ok((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter("info"));
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(e) = file_error {
        warn!("File logging disabled ({}): {}", log_path.display(), e);
    }

    Ok(guard)
}

fn file_writer(log_path: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("invalid log path: {}", log_path.display()))?;

    let appender = tracing_appender::rolling::RollingFileAppender::builder()
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)?;

    Ok(tracing_appender::non_blocking(appender))
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}
