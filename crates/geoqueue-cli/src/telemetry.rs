//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Installs the process-wide subscriber; later calls are no-ops.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Logs go to stderr so
/// stdout stays machine-readable JSON.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
