use serde::{Deserialize, Serialize};

/// Address of a browsing context able to host a countdown UI instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameAddress {
    pub tab_id: u32,
    pub frame_id: u32,
}

impl std::fmt::Display for FrameAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tab_id, self.frame_id)
    }
}

/// Messages pushed from the daemon to a UI instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiMessage {
    /// Liveness probe; any answer counts as alive.
    Ping,
    /// New data is available in the store; re-render the countdown.
    RefreshCountdown,
    /// Ask the frame for the text of its page scripts (email fallback).
    CollectPageText,
}

/// Where a UI instance reported itself from during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiOrigin {
    Iframe,
    App,
}

/// The script + stylesheet pair dispatched into a frame without a UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiBundle {
    pub script: String,
    pub stylesheet: String,
}

impl UiBundle {
    pub fn from_config(ui: &punchd_core::config::UiConfig) -> Self {
        Self {
            script: ui.script.clone(),
            stylesheet: ui.stylesheet.clone(),
        }
    }
}
