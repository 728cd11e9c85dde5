//! Unix socket server for the browser-side host.
//!
//! One host connection is active at a time; its write half is shared
//! through [`HostLink`] so the bridge pump and the reset path can both
//! answer. Requests to frames get a correlation id and wait in a pending
//! map until the host's reply comes back (or the bridge times out).

pub mod connection;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::UnixListener;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use punchd_core::errors::PunchdError;

use crate::bridge::{BridgeCommand, BridgeError, FrameAddress};
use crate::orchestrator::RefreshOrchestrator;
use crate::portal::PortalClient;
use crate::protocol::{DaemonMessage, ProtocolError, write_message};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind socket at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No host connection")]
    NoHost,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PunchdError for ServerError {
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Bind { .. } => "SERVER_BIND_FAILED",
            ServerError::NoHost => "SERVER_NO_HOST",
            ServerError::Protocol(_) => "SERVER_PROTOCOL_ERROR",
            ServerError::Io(_) => "SERVER_IO_ERROR",
        }
    }
}

/// Default socket location, next to the config and store files.
pub fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".punchd")
        .join("punchd.sock")
}

pub(crate) type HostWriter = Arc<Mutex<OwnedWriteHalf>>;

struct PendingReply {
    target: FrameAddress,
    reply: oneshot::Sender<Result<serde_json::Value, BridgeError>>,
}

/// Shared handle to the currently connected host.
#[derive(Clone, Default)]
pub(crate) struct HostLink {
    writer: Arc<Mutex<Option<HostWriter>>>,
    pending: Arc<Mutex<HashMap<String, PendingReply>>>,
    next_id: Arc<AtomicU64>,
}

impl HostLink {
    async fn attach(&self, writer: HostWriter) {
        let mut slot = self.writer.lock().await;
        if slot.is_some() {
            // A new host connection supersedes the old one
            warn!(event = "daemon.server.host_replaced");
        }
        *slot = Some(writer);
    }

    async fn detach(&self, writer: &HostWriter) {
        let mut slot = self.writer.lock().await;
        if slot.as_ref().is_some_and(|w| Arc::ptr_eq(w, writer)) {
            *slot = None;
        }
    }

    fn next_request_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    async fn register(
        &self,
        id: String,
        target: FrameAddress,
        reply: oneshot::Sender<Result<serde_json::Value, BridgeError>>,
    ) {
        let mut pending = self.pending.lock().await;
        pending.insert(id, PendingReply { target, reply });
    }

    async fn take_pending(&self, id: &str) -> Option<PendingReply> {
        self.pending.lock().await.remove(id)
    }

    /// Hand the host's reply to whoever is waiting on the request id.
    ///
    /// A reply for an unknown id is dropped: the bridge request already
    /// timed out and its frame was evicted.
    pub(crate) async fn resolve(
        &self,
        id: &str,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        let Some(entry) = self.take_pending(id).await else {
            debug!(event = "daemon.server.reply_unmatched", id = id);
            return;
        };
        let outcome = match error {
            Some(message) => Err(BridgeError::Refused {
                target: entry.target,
                message,
            }),
            None => Ok(result.unwrap_or(serde_json::Value::Null)),
        };
        let _ = entry.reply.send(outcome);
    }

    pub(crate) async fn send(&self, message: &DaemonMessage) -> Result<(), ServerError> {
        let writer = {
            let slot = self.writer.lock().await;
            slot.clone().ok_or(ServerError::NoHost)?
        };
        let mut w = writer.lock().await;
        write_message(&mut *w, message).await?;
        Ok(())
    }
}

/// Deliver bridge commands from daemon components to the host.
async fn pump_bridge(
    link: HostLink,
    mut rx: mpsc::UnboundedReceiver<BridgeCommand>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => deliver(&link, command).await,
                None => break,
            },
        }
    }
    debug!(event = "daemon.server.bridge_pump_stopped");
}

async fn deliver(link: &HostLink, command: BridgeCommand) {
    match command {
        BridgeCommand::Notify { target, message } => {
            if let Err(e) = link.send(&DaemonMessage::Notify { target, message }).await {
                warn!(event = "daemon.server.notify_failed", frame = %target, error = %e);
            }
        }
        BridgeCommand::Inject { target, bundle } => {
            if let Err(e) = link.send(&DaemonMessage::Inject { target, bundle }).await {
                warn!(event = "daemon.server.inject_failed", frame = %target, error = %e);
            }
        }
        BridgeCommand::Request {
            target,
            message,
            reply,
        } => {
            let id = link.next_request_id();
            link.register(id.clone(), target, reply).await;
            let wire = DaemonMessage::Request {
                id: id.clone(),
                target,
                message,
            };
            if let Err(e) = link.send(&wire).await {
                warn!(event = "daemon.server.request_failed", frame = %target, error = %e);
                if let Some(entry) = link.take_pending(&id).await {
                    let _ = entry.reply.send(Err(BridgeError::Closed));
                }
            }
        }
    }
}

/// Bind the socket and serve until shutdown.
pub async fn run<P: PortalClient>(
    socket_path: &Path,
    orchestrator: RefreshOrchestrator<P>,
    bridge_rx: mpsc::UnboundedReceiver<BridgeCommand>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // A stale socket from a previous run blocks the bind
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path).map_err(|e| ServerError::Bind {
        path: socket_path.display().to_string(),
        source: e,
    })?;
    info!(event = "daemon.server.listening", path = %socket_path.display());

    let link = HostLink::default();
    tokio::spawn(pump_bridge(link.clone(), bridge_rx, shutdown.clone()));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(connection::handle_connection(
                        stream,
                        orchestrator.clone(),
                        link.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!(event = "daemon.server.accept_failed", error = %e);
                }
            },
        }
    }

    let _ = std::fs::remove_file(socket_path);
    info!(event = "daemon.server.stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::BufReader;
    use tokio::net::UnixStream;

    use crate::bridge::UiMessage;
    use crate::protocol::read_message;

    fn addr() -> FrameAddress {
        FrameAddress {
            tab_id: 1,
            frame_id: 0,
        }
    }

    #[tokio::test]
    async fn test_send_without_host_fails() {
        let link = HostLink::default();
        let result = link
            .send(&DaemonMessage::Notify {
                target: addr(),
                message: UiMessage::Ping,
            })
            .await;
        assert!(matches!(result, Err(ServerError::NoHost)));
    }

    #[tokio::test]
    async fn test_request_reaches_host_and_reply_resolves() {
        let link = HostLink::default();
        let (daemon_side, host_side) = UnixStream::pair().unwrap();
        let (_, writer) = daemon_side.into_split();
        link.attach(Arc::new(Mutex::new(writer))).await;

        let (reply_tx, reply_rx) = oneshot::channel();
        deliver(
            &link,
            BridgeCommand::Request {
                target: addr(),
                message: UiMessage::Ping,
                reply: reply_tx,
            },
        )
        .await;

        let (host_reader, _keep_writer) = host_side.into_split();
        let mut reader = BufReader::new(host_reader);
        let wire: DaemonMessage = read_message(&mut reader).await.unwrap().unwrap();
        let id = match wire {
            DaemonMessage::Request { id, message, .. } => {
                assert_eq!(message, UiMessage::Ping);
                id
            }
            other => panic!("expected Request, got: {:?}", other),
        };

        link.resolve(&id, Some(serde_json::json!("pong")), None).await;
        assert_eq!(reply_rx.await.unwrap().unwrap(), serde_json::json!("pong"));
    }

    #[tokio::test]
    async fn test_reply_with_error_refuses() {
        let link = HostLink::default();
        let (reply_tx, reply_rx) = oneshot::channel();
        link.register("9".to_string(), addr(), reply_tx).await;

        link.resolve("9", None, Some("frame gone".to_string())).await;

        assert!(matches!(
            reply_rx.await.unwrap(),
            Err(BridgeError::Refused { .. })
        ));
    }

    #[tokio::test]
    async fn test_unmatched_reply_is_dropped() {
        let link = HostLink::default();
        // Must not panic or hang
        link.resolve("404", Some(serde_json::json!(1)), None).await;
    }

    #[tokio::test]
    async fn test_request_without_host_closes_reply() {
        let link = HostLink::default();
        let (reply_tx, reply_rx) = oneshot::channel();
        deliver(
            &link,
            BridgeCommand::Request {
                target: addr(),
                message: UiMessage::Ping,
                reply: reply_tx,
            },
        )
        .await;
        assert!(matches!(
            reply_rx.await.unwrap(),
            Err(BridgeError::Closed)
        ));
        // The failed request must not linger in the pending map
        assert!(link.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_detach_only_clears_own_writer() {
        let link = HostLink::default();
        let (a, _a_peer) = UnixStream::pair().unwrap();
        let (b, _b_peer) = UnixStream::pair().unwrap();
        let (_, a_writer) = a.into_split();
        let (_, b_writer) = b.into_split();
        let a_writer = Arc::new(Mutex::new(a_writer));
        let b_writer = Arc::new(Mutex::new(b_writer));

        link.attach(a_writer.clone()).await;
        link.attach(b_writer.clone()).await;

        // Late detach of the superseded connection leaves the new one
        link.detach(&a_writer).await;
        assert!(link.writer.lock().await.is_some());

        link.detach(&b_writer).await;
        assert!(link.writer.lock().await.is_none());
    }
}
