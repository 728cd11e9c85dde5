use serde::{Deserialize, Serialize};

use crate::bridge::{FrameAddress, UiBundle, UiMessage, UiOrigin};

/// Host -> Daemon messages.
///
/// The host is the browser-side shim that forwards browser events and
/// relays frame traffic. Each variant maps to a JSONL message with
/// `"type"` as the tag field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// A cookie changed in the browser's jar.
    CookieChanged {
        domain: String,
        /// `None` when the cookie was removed.
        #[serde(default)]
        value: Option<String>,
    },

    /// A document finished loading in some frame.
    NavigationCompleted {
        tab_id: u32,
        frame_id: u32,
        url: String,
    },

    TabClosed { tab_id: u32 },

    /// A UI instance registers itself as the active host for its frame.
    SetupInjector {
        tab_id: u32,
        frame_id: u32,
        origin: UiOrigin,
    },

    /// A mounted UI instance finished its startup handshake.
    InjectorReady { tab_id: u32 },

    /// Explicit user request to drop cached portal data and refetch.
    /// Answered with [`DaemonMessage::ResetResult`] under the same id.
    ResetPortalData { id: String, origin: UiOrigin },

    /// Answer to a [`DaemonMessage::Request`] with the matching id.
    Reply {
        id: String,
        #[serde(default)]
        result: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Daemon -> Host messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Fire-and-forget message for a frame.
    Notify {
        #[serde(flatten)]
        target: FrameAddress,
        message: UiMessage,
    },

    /// Message expecting a [`HostMessage::Reply`] with the same id.
    Request {
        id: String,
        #[serde(flatten)]
        target: FrameAddress,
        message: UiMessage,
    },

    /// Dispatch the UI bundle into a frame.
    Inject {
        #[serde(flatten)]
        target: FrameAddress,
        bundle: UiBundle,
    },

    /// Answer to [`HostMessage::ResetPortalData`].
    ResetResult { id: String, refreshed: bool },
}
