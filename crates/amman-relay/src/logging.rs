//! Log output for binaries and tests built on the relay.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `info`. Returns `false` if a global subscriber was already set.
pub fn init() -> bool {
    init_with_default("info")
}

/// Like [`init`], with `directive` used when `RUST_LOG` is unset or
/// unparsable, e.g. `"amman_relay_client=trace"`.
pub fn init_with_default(directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("relay logging initialized");
    }
    installed
}
