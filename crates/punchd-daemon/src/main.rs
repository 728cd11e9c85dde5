use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use punchd_core::config::PunchdConfig;
use punchd_core::storage::FileStore;
use punchd_core::{events, init_logging};

use punchd_daemon::bridge::{BridgeHandle, UiBundle};
use punchd_daemon::browser::CookieState;
use punchd_daemon::frames::FrameLifecycleManager;
use punchd_daemon::orchestrator::RefreshOrchestrator;
use punchd_daemon::portal::OdooPortalClient;
use punchd_daemon::server;
use punchd_daemon::session::SessionCache;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let quiet = std::env::args().any(|a| a == "--quiet" || a == "-q");
    init_logging(quiet);

    let config = PunchdConfig::load_hierarchy()?;

    let result = run(&config).await;
    if let Err(e) = &result {
        events::log_app_error(e.as_ref());
    }
    result
}

async fn run(config: &PunchdConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStore::open_default()?);
    let portal = Arc::new(OdooPortalClient::new(&config.portal)?);
    let cookie = CookieState::new(&config.portal);
    let (bridge, bridge_rx) = BridgeHandle::channel(config.heartbeat.ping_timeout());

    let frames = FrameLifecycleManager::new(
        bridge.clone(),
        UiBundle::from_config(&config.ui),
        &config.heartbeat,
    );
    let session = SessionCache::new(
        portal.clone(),
        store.clone(),
        cookie.clone(),
        bridge,
        &config.portal,
    );
    let orchestrator =
        RefreshOrchestrator::new(session, portal, store, cookie, frames, config);

    events::log_app_startup(config);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let socket_path = server::default_socket_path();
    server::run(&socket_path, orchestrator, bridge_rx, shutdown).await?;

    events::log_app_shutdown("socket server exited");
    Ok(())
}

async fn watch_signals(shutdown: CancellationToken) {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(event = "daemon.signal.install_failed", error = %e);
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(event = "daemon.signal.interrupt");
        }
        _ = sigterm.recv() => {
            info!(event = "daemon.signal.terminate");
        }
    }
    shutdown.cancel();
}
