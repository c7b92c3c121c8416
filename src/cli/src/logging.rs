use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::SystemTime},
    prelude::*,
    EnvFilter,
};

/// Logs go to stderr by default so stdout stays a clean JSON-lines result
/// stream; `--log-file` redirects them to a file instead.
pub fn setup_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| "memscan.log".as_ref());
            let file_appender = RollingFileAppender::new(Rotation::NEVER, dir, file_name);

            let file_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_timer(SystemTime)
                .with_ansi(false)
                .with_writer(file_appender);

            let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
        None => {
            let stderr_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_timer(SystemTime)
                .with_writer(std::io::stderr);

            let subscriber = tracing_subscriber::registry().with(filter).with(stderr_layer);
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
    }

    Ok(())
}
