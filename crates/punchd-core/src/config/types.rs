//! Configuration type definitions for the punchd daemon.
//!
//! These types are serialized/deserialized from TOML config files.
//!
//! # Example Configuration
//!
//! ```toml
//! [portal]
//! domain = "portal.example.com"
//! base_url = "https://portal.example.com"
//! email_domain = "example.com"
//!
//! [refresh]
//! debounce_ms = 5000
//! retry_interval_ms = 10000
//!
//! [heartbeat]
//! poll_interval_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration loaded from TOML config files.
///
/// Loaded from `~/.punchd/config.toml` (user) then `./.punchd/config.toml`
/// (project); sections present in the project file override the user file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PunchdConfig {
    /// Attendance portal endpoint and identity settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Chat application the countdown is rendered into
    #[serde(default)]
    pub chat: ChatConfig,

    /// Refresh pipeline timing
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Frame liveness polling
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// UI bundle dispatched into chat frames
    #[serde(default)]
    pub ui: UiConfig,
}

/// Attendance portal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Cookie domain watched for session changes.
    #[serde(default = "super::defaults::default_portal_domain")]
    pub domain: String,

    /// Base URL for portal requests.
    #[serde(default = "super::defaults::default_portal_base_url")]
    pub base_url: String,

    /// Name of the session cookie.
    #[serde(default = "super::defaults::default_cookie_name")]
    pub cookie_name: String,

    /// Organization mail domain used by the fallback email extraction.
    #[serde(default = "super::defaults::default_email_domain")]
    pub email_domain: String,
}

/// Chat application addresses that qualify a navigation for injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Host of the standalone chat application.
    #[serde(default = "super::defaults::default_chat_host")]
    pub host: String,

    /// Full URL of the chat view embedded in the mail application.
    #[serde(default = "super::defaults::default_mail_chat_url")]
    pub mail_url: String,
}

/// Refresh pipeline timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Trailing debounce window for cookie-change bursts.
    /// Default: 5000 ms.
    #[serde(default = "super::defaults::default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval between retry attempts after a failed refresh.
    /// Default: 10000 ms.
    #[serde(default = "super::defaults::default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl RefreshConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Frame liveness polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Interval between liveness pings to ready frames.
    /// Default: 2000 ms.
    #[serde(default = "super::defaults::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long to wait for a ping answer before treating the frame as dead.
    /// Default: 1000 ms.
    #[serde(default = "super::defaults::default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
}

impl HeartbeatConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// UI bundle dispatched into chat frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Script file injected into a frame without a live UI instance.
    #[serde(default = "super::defaults::default_ui_script")]
    pub script: String,

    /// Stylesheet injected alongside the script.
    #[serde(default = "super::defaults::default_ui_stylesheet")]
    pub stylesheet: String,
}
