//! Configuration validation.

use crate::config::types::PunchdConfig;
use crate::errors::ConfigError;

/// Validate the merged configuration.
///
/// Timing values of zero would turn the debounce into a busy loop and the
/// heartbeat into a ping storm, so they are rejected up front.
pub fn validate_config(config: &PunchdConfig) -> Result<(), ConfigError> {
    if config.portal.domain.trim().is_empty() {
        return Err(ConfigError::InvalidConfiguration {
            message: "portal.domain must not be empty".to_string(),
        });
    }

    if config.portal.base_url.trim().is_empty() {
        return Err(ConfigError::InvalidConfiguration {
            message: "portal.base_url must not be empty".to_string(),
        });
    }

    if config.chat.host.trim().is_empty() {
        return Err(ConfigError::InvalidConfiguration {
            message: "chat.host must not be empty".to_string(),
        });
    }

    if config.refresh.debounce_ms == 0 {
        return Err(ConfigError::InvalidConfiguration {
            message: "refresh.debounce_ms must be greater than zero".to_string(),
        });
    }

    if config.refresh.retry_interval_ms == 0 {
        return Err(ConfigError::InvalidConfiguration {
            message: "refresh.retry_interval_ms must be greater than zero".to_string(),
        });
    }

    if config.heartbeat.poll_interval_ms == 0 {
        return Err(ConfigError::InvalidConfiguration {
            message: "heartbeat.poll_interval_ms must be greater than zero".to_string(),
        });
    }

    Ok(())
}
