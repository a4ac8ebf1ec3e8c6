//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding per-module log directives.
pub const LOG_ENV: &str = "IMGSCAN_LOG";

/// Filter used when `IMGSCAN_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "imgscan=info";

/// Install the global subscriber.
///
/// `IMGSCAN_LOG=imgscan_analysis=debug,imgscan_storage=warn` selects levels
/// per crate. Safe to call more than once; only the first call installs.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // Another subscriber may already be installed by an embedding binary.
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
