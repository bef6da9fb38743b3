//! Tracing subscriber initialization for the server binary.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Filter precedence: explicit `filter` argument (CLI / settings), then the
/// `RUST_LOG` environment variable, then `info`. Called once at startup;
/// subsequent calls are ignored so tests can call it freely.
pub fn init(filter: Option<&str>) {
    let env_filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
