use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "pdesk.log";

/// Install the global subscriber: stderr always, plus a daily file when
/// `log.directory` is set. Keep the returned guard alive until exit or
/// buffered file lines are lost.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = build_filter(&config.level, std::env::var("RUST_LOG").ok())?;

  let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

  let (file_layer, guard) = match &config.directory {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer().with_ansi(false).with_writer(writer);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(stderr_layer)
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialise logging: {}", e))?;

  Ok(guard)
}

/// `RUST_LOG` wins over the configured level when it is set and non-empty.
fn build_filter(level: &str, env: Option<String>) -> Result<EnvFilter> {
  let directive = env
    .filter(|v| !v.trim().is_empty())
    .unwrap_or_else(|| level.to_string());
  EnvFilter::try_new(&directive).map_err(|e| eyre!("Invalid log filter '{}': {}", directive, e))
}
