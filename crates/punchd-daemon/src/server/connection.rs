//! Per-connection read loop for the browser-side host.

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bridge::FrameAddress;
use crate::browser::BrowserEvent;
use crate::orchestrator::RefreshOrchestrator;
use crate::portal::PortalClient;
use crate::protocol::{DaemonMessage, HostMessage, read_message};
use crate::server::{HostLink, HostWriter};

/// Handle a single host connection.
///
/// Reads JSONL messages, feeds browser events and UI requests into the
/// orchestrator, and routes replies back to their pending bridge
/// requests. Long-running work (navigation refresh, reset) is spawned so
/// the read loop stays free to take heartbeat replies.
pub(crate) async fn handle_connection<P: PortalClient>(
    stream: UnixStream,
    orchestrator: RefreshOrchestrator<P>,
    link: HostLink,
    shutdown: CancellationToken,
) {
    debug!(event = "daemon.connection.accepted");

    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let writer: HostWriter = Arc::new(Mutex::new(writer));
    link.attach(writer.clone()).await;

    loop {
        tokio::select! {
            result = read_message::<_, HostMessage>(&mut reader) => {
                match result {
                    Ok(Some(msg)) => dispatch_message(msg, &orchestrator, &link).await,
                    Ok(None) => {
                        debug!(event = "daemon.connection.closed");
                        break;
                    }
                    Err(e) => {
                        warn!(event = "daemon.connection.read_error", error = %e);
                        break;
                    }
                }
            }
            _ = shutdown.cancelled() => {
                debug!(event = "daemon.connection.shutdown");
                break;
            }
        }
    }

    link.detach(&writer).await;
}

async fn dispatch_message<P: PortalClient>(
    msg: HostMessage,
    orchestrator: &RefreshOrchestrator<P>,
    link: &HostLink,
) {
    match msg {
        HostMessage::CookieChanged { domain, value } => {
            orchestrator
                .handle_event(BrowserEvent::CookieChanged { domain, value })
                .await;
        }

        HostMessage::NavigationCompleted {
            tab_id,
            frame_id,
            url,
        } => {
            // May run the full pipeline; keep the read loop free
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .handle_event(BrowserEvent::NavigationCompleted {
                        tab_id,
                        frame_id,
                        url,
                    })
                    .await;
            });
        }

        HostMessage::TabClosed { tab_id } => {
            orchestrator
                .handle_event(BrowserEvent::TabClosed { tab_id })
                .await;
        }

        HostMessage::SetupInjector {
            tab_id,
            frame_id,
            origin,
        } => {
            orchestrator
                .handle_setup(FrameAddress { tab_id, frame_id }, origin)
                .await;
        }

        HostMessage::InjectorReady { tab_id } => {
            orchestrator.handle_ready(tab_id).await;
        }

        HostMessage::ResetPortalData { id, origin } => {
            debug!(event = "daemon.connection.reset_requested", origin = ?origin);
            let orchestrator = orchestrator.clone();
            let link = link.clone();
            tokio::spawn(async move {
                let refreshed = orchestrator.handle_reset().await;
                let answer = DaemonMessage::ResetResult { id, refreshed };
                if let Err(e) = link.send(&answer).await {
                    warn!(event = "daemon.connection.reset_reply_failed", error = %e);
                }
            });
        }

        HostMessage::Reply { id, result, error } => {
            link.resolve(&id, result, error).await;
        }
    }
}
