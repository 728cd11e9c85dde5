//! Default implementations for configuration types.
//!
//! This module contains all `Default` implementations and helper functions
//! for providing default values in serde deserialization.

use crate::config::types::{ChatConfig, HeartbeatConfig, PortalConfig, RefreshConfig, UiConfig};

pub fn default_portal_domain() -> String {
    "portal.example.com".to_string()
}

pub fn default_portal_base_url() -> String {
    "https://portal.example.com".to_string()
}

pub fn default_cookie_name() -> String {
    "session_id".to_string()
}

pub fn default_email_domain() -> String {
    "example.com".to_string()
}

pub fn default_chat_host() -> String {
    "chat.google.com".to_string()
}

pub fn default_mail_chat_url() -> String {
    "https://mail.google.com/chat".to_string()
}

/// Trailing debounce for cookie-change bursts (5000 ms).
///
/// The portal rewrites its session cookie several times during login;
/// one trailing window collapses the burst into a single refresh.
pub fn default_debounce_ms() -> u64 {
    5000
}

/// Interval between retry attempts after a failed refresh (10000 ms).
pub fn default_retry_interval_ms() -> u64 {
    10000
}

/// Interval between liveness pings to ready frames (2000 ms).
pub fn default_poll_interval_ms() -> u64 {
    2000
}

/// Wait for a ping answer before treating a frame as dead (1000 ms).
pub fn default_ping_timeout_ms() -> u64 {
    1000
}

pub fn default_ui_script() -> String {
    "dist/scripts/injector.js".to_string()
}

pub fn default_ui_stylesheet() -> String {
    "dist/assets/countdown.css".to_string()
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            domain: default_portal_domain(),
            base_url: default_portal_base_url(),
            cookie_name: default_cookie_name(),
            email_domain: default_email_domain(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: default_chat_host(),
            mail_url: default_mail_chat_url(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            script: default_ui_script(),
            stylesheet: default_ui_stylesheet(),
        }
    }
}
