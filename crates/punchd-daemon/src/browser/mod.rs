//! Browser-side signals and cookie tracking.
//!
//! The browser-extension host forwards cookie changes, navigations, and
//! tab closes over the socket; this module is the daemon-side model of
//! those signals plus the synchronously readable session cookie.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use punchd_core::config::{ChatConfig, PortalConfig};

/// A signal observed by the browser and forwarded to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// The value of a cookie changed (or was removed).
    CookieChanged {
        domain: String,
        value: Option<String>,
    },
    /// A top-level or frame navigation finished loading.
    NavigationCompleted {
        tab_id: u32,
        frame_id: u32,
        url: String,
    },
    /// A tab (and all its frames) went away.
    TabClosed { tab_id: u32 },
}

/// Latest known portal session cookie, readable without I/O.
///
/// The credential is derived from the cookie on every read; it is never
/// cached independently, so a cookie removal is visible immediately.
#[derive(Debug, Clone)]
pub struct CookieState {
    cookie_name: String,
    value: Arc<Mutex<Option<String>>>,
}

impl CookieState {
    pub fn new(portal: &PortalConfig) -> Self {
        Self {
            cookie_name: portal.cookie_name.clone(),
            value: Arc::new(Mutex::new(None)),
        }
    }

    pub fn update(&self, value: Option<String>) {
        let mut current = self.value.lock().unwrap_or_else(|e| e.into_inner());
        *current = value.filter(|v| !v.is_empty());
    }

    /// The `Cookie` header value for portal requests, or empty when
    /// unauthenticated.
    pub fn credential(&self) -> String {
        let current = self.value.lock().unwrap_or_else(|e| e.into_inner());
        match current.as_deref() {
            Some(v) => format!("{}={}", self.cookie_name, v),
            None => String::new(),
        }
    }

    pub fn has_cookie(&self) -> bool {
        let current = self.value.lock().unwrap_or_else(|e| e.into_inner());
        current.is_some()
    }
}

/// Whether a completed navigation should host a countdown UI.
///
/// Matches the standalone chat application host and the chat view
/// embedded in the mail application. URLs carrying `oi=1` are the mail
/// application's own non-chat views and are skipped.
pub fn is_chat_navigation(url: &str, chat: &ChatConfig) -> bool {
    if url.contains("oi=1") {
        return false;
    }

    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("");

    host == chat.host || url.starts_with(&chat.mail_url)
}
