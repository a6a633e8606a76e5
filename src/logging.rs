//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{PlanError, Result};

/// Installs a global `fmt` subscriber filtered by `level`, which accepts any
/// `EnvFilter` directive such as `info` or `plantree::explain=debug`.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| PlanError::internal(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| PlanError::internal("logging already initialized"))
}
