//! Messaging bridge between the daemon and per-frame UI instances.
//!
//! Components hold a cloneable [`BridgeHandle`] and never talk to the
//! transport directly; the transport end (the socket server, or a test
//! harness) drains [`BridgeCommand`]s from the paired receiver. Requests
//! carry a oneshot reply slot plus a timeout so a dead frame surfaces as
//! an error instead of a hang.

pub mod messages;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use punchd_core::errors::PunchdError;

pub use messages::{FrameAddress, UiBundle, UiMessage, UiOrigin};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Bridge transport is closed")]
    Closed,

    #[error("No answer from frame {target} within {timeout_ms}ms")]
    Timeout { target: FrameAddress, timeout_ms: u64 },

    #[error("Frame {target} refused delivery: {message}")]
    Refused { target: FrameAddress, message: String },
}

impl PunchdError for BridgeError {
    fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Closed => "BRIDGE_CLOSED",
            BridgeError::Timeout { .. } => "BRIDGE_TIMEOUT",
            BridgeError::Refused { .. } => "BRIDGE_REFUSED",
        }
    }
}

/// A command for the transport end of the bridge.
#[derive(Debug)]
pub enum BridgeCommand {
    /// Fire-and-forget message to a frame.
    Notify {
        target: FrameAddress,
        message: UiMessage,
    },
    /// Message expecting an answer; the transport resolves `reply`.
    Request {
        target: FrameAddress,
        message: UiMessage,
        reply: oneshot::Sender<Result<serde_json::Value, BridgeError>>,
    },
    /// Dispatch the UI bundle into a frame.
    Inject {
        target: FrameAddress,
        bundle: UiBundle,
    },
}

/// Sender half of the bridge held by daemon components.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeCommand>,
    request_timeout: Duration,
}

impl BridgeHandle {
    /// Create a bridge pair: the handle for components, the receiver for
    /// the transport.
    pub fn channel(
        request_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                request_timeout,
            },
            rx,
        )
    }

    pub fn notify(&self, target: FrameAddress, message: UiMessage) -> Result<(), BridgeError> {
        self.tx
            .send(BridgeCommand::Notify { target, message })
            .map_err(|_| BridgeError::Closed)
    }

    pub fn inject(&self, target: FrameAddress, bundle: UiBundle) -> Result<(), BridgeError> {
        self.tx
            .send(BridgeCommand::Inject { target, bundle })
            .map_err(|_| BridgeError::Closed)
    }

    /// Send a request and wait for the frame's answer.
    ///
    /// Fails with [`BridgeError::Timeout`] when no answer arrives within
    /// the configured window; a dropped reply slot means the transport
    /// went away and maps to [`BridgeError::Closed`].
    pub async fn request(
        &self,
        target: FrameAddress,
        message: UiMessage,
    ) -> Result<serde_json::Value, BridgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BridgeCommand::Request {
                target,
                message,
                reply: reply_tx,
            })
            .map_err(|_| BridgeError::Closed)?;

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::Closed),
            Err(_) => Err(BridgeError::Timeout {
                target,
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}
