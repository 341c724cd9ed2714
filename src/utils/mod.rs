//! Process bootstrap helpers.

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LOG_ENV_VAR;

/// Install the global tracing subscriber.
///
/// Filter directives come from `BAZAAR_LOG` (standard env-filter syntax);
/// the default level is info. Call once, from the binary entry point.
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    info!(service, "logging initialised");
}
