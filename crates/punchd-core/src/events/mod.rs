//! Application lifecycle events with the refresh-cadence summary.

use tracing::{error, info};

use crate::config::PunchdConfig;

/// Startup event carrying the effective refresh cadence, so a log tail is
/// enough to see which config hierarchy actually won.
pub fn log_app_startup(config: &PunchdConfig) {
    info!(
        event = "core.app.startup_completed",
        version = env!("CARGO_PKG_VERSION"),
        portal_domain = %config.portal.domain,
        debounce_ms = config.refresh.debounce_ms,
        retry_interval_ms = config.refresh.retry_interval_ms,
        poll_interval_ms = config.heartbeat.poll_interval_ms
    );
}

pub fn log_app_shutdown(reason: &str) {
    info!(event = "core.app.shutdown_started", reason = reason);
}

pub fn log_app_error(error: &dyn std::error::Error) {
    error!(
        event = "core.app.error_occurred",
        error = %error,
        error_type = std::any::type_name_of_val(error)
    );
}
