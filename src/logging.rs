//! Logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the embedding application. [`init_logging`] is a convenience for tools and
//! tests that just want readable output.
//!
//! Event targets:
//!
//! | Target | Events |
//! |---|---|
//! | `registry` | descriptor and conversion registration |
//! | `coupler` | coupling outcomes |
//! | `marshal` | individual conversions |
//! | `copy_back` | binding lifecycle and copy-back failures |
//! | `dispatch` | overload selection and ties |

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "stlcouple=debug,registry=debug,coupler=debug,marshal=debug,copy_back=debug,dispatch=debug"
    } else {
        "stlcouple=info,registry=info,coupler=info,marshal=info,copy_back=info,dispatch=info"
    }
}

/// Install a compact fmt subscriber filtered by `RUST_LOG`.
///
/// Calling this more than once, or after another subscriber was installed,
/// has no effect.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_line_number(cfg!(debug_assertions)),
            )
            .try_init();
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}
