/*!
Logging and profiling setup for the command line.

Two implementations share the same API:

- real: compiled when `feature = "profiling"` is set. A Chrome trace layer is
  registered next to the log output when `ENABLE_PROFILING` is set, and the
  trace file is flushed when the returned guard is dropped.
- stub: logging only.

Logs go to stderr so that stdout can carry CSV output. `RUST_LOG` overrides
the default filter.
*/

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
fn default_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives()))
}

#[cfg(feature = "profiling")]
mod inner {
    use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{Registry, fmt};

    /// Keeps the trace file open while alive; dropping it flushes the trace
    pub struct LoggingGuard {
        _chrome: Option<FlushGuard>,
    }

    /// Initialize logging and, if `ENABLE_PROFILING` is set, Chrome tracing.
    pub fn setup_logging() -> LoggingGuard {
        let (chrome_layer, guard) = if std::env::var("ENABLE_PROFILING").is_ok() {
            let (layer, guard) = ChromeLayerBuilder::<Registry>::new().build();
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(super::env_filter());

        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();

        if guard.is_some() {
            tracing::info!("ENABLE_PROFILING set - recording a Chrome trace for this run");
        }

        LoggingGuard { _chrome: guard }
    }
}

#[cfg(not(feature = "profiling"))]
mod inner {
    /// Placeholder guard, nothing to flush without profiling
    pub struct LoggingGuard;

    /// Initialize logging.
    pub fn setup_logging() -> LoggingGuard {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(super::env_filter())
            .init();
        LoggingGuard
    }
}

pub use inner::{LoggingGuard, setup_logging};
