//! Tracing initialization.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Filter resolution: `RUST_LOG` when set, otherwise `info` for the
/// holocron crates and `warn` for dependencies. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,holocron=info,holocron_wiki=info,holocron_providers=info,holocron_application=info,holocron_infrastructure=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
