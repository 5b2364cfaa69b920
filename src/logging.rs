//! Logging initialization using tracing.
//!
//! Output goes to stderr: stdout belongs to the console, and while the booth
//! holds graphics mode nothing printed there would be visible anyway.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{BoothError, Result};

/// Initialize the tracing subscriber with the specified log level.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| BoothError::Config(format!("failed to initialise logging: {}", e)))
}
