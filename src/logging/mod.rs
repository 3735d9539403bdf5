//! Log subscriber setup
//!
//! The bridge only emits `tracing` events and spans; installing a subscriber
//! is the application's call. [`init_subscriber`] is the convenience used when
//! a bridge is configured with `debug: true`.
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG, else info / debug)
//!   └── Fmt Layer (console text, or JSON lines)
//! ```

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Install a global console subscriber
///
/// `RUST_LOG` wins when set. Otherwise the level is `debug` when `debug` is
/// true and `info` when not. Returns `false` if a global subscriber was
/// already installed, in which case nothing changes.
pub fn init_subscriber(debug: bool) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    install(
        tracing_subscriber::registry()
            .with(env_filter(debug))
            .with(fmt_layer),
    )
}

/// Like [`init_subscriber`], emitting one JSON object per event
pub fn init_json_subscriber(debug: bool) -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_target(true);

    install(
        tracing_subscriber::registry()
            .with(env_filter(debug))
            .with(fmt_layer),
    )
}

fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(debug)))
}

fn install<S>(subscriber: S) -> bool
where
    S: Subscriber + Send + Sync + 'static,
{
    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "Global subscriber already set");
            false
        }
    }
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}
