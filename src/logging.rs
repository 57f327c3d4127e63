use crate::requests::{Error, Result};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum LogTarget {
    Stderr,
    /// Appends to the file, creating it if needed
    File(PathBuf),
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level.
///
/// For [`LogTarget::File`] the returned guard has to be kept alive, dropping it flushes and
/// stops the background writer.
pub fn init(target: LogTarget) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);

    let guard = match target {
        LogTarget::Stderr => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .try_init()
                .map_err(|e| Error::Config(format!("logging already initialized: {e}")))?;

            None
        }
        LogTarget::File(path) => {
            let file = std::fs::File::options()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .compact(),
                )
                .try_init()
                .map_err(|e| Error::Config(format!("logging already initialized: {e}")))?;

            Some(guard)
        }
    };

    Ok(guard)
}
