//! Integration tests for the punchd host-daemon roundtrip.
//!
//! These tests start a real server on a temp socket, connect a raw
//! JSONL client playing the browser-side host, and exercise the full
//! protocol against a stubbed portal.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;

use punchd_core::attendance::{AttendanceResponse, EmployeeResponse};
use punchd_core::config::{
    ChatConfig, HeartbeatConfig, PortalConfig, PunchdConfig, RefreshConfig, UiConfig,
};
use punchd_core::storage::{self, KeyValueStore, LoginStatus, MemoryStore, keys};
use punchd_core::time;

use punchd_daemon::bridge::{BridgeHandle, UiBundle};
use punchd_daemon::browser::CookieState;
use punchd_daemon::frames::FrameLifecycleManager;
use punchd_daemon::orchestrator::RefreshOrchestrator;
use punchd_daemon::portal::{PortalClient, PortalError};
use punchd_daemon::server;
use punchd_daemon::session::SessionCache;

/// Portal stub with per-call counters and a settable attendance payload.
#[derive(Default)]
struct StubPortal {
    attendance_records: std::sync::Mutex<serde_json::Value>,
    overview_calls: AtomicUsize,
}

impl StubPortal {
    fn set_records(&self, records: serde_json::Value) {
        *self.attendance_records.lock().unwrap() = records;
    }
}

impl PortalClient for StubPortal {
    async fn fetch_homepage(&self, _credential: &str) -> Result<String, PortalError> {
        Ok(concat!(
            r#"<script type="text/javascript">"#,
            r#"odoo.session_info = {"username": "a.person@example.com"};"#,
            "</script>"
        )
        .to_string())
    }

    async fn search_employee(
        &self,
        _credential: &str,
        _email: &str,
    ) -> Result<EmployeeResponse, PortalError> {
        let raw = serde_json::json!({
            "result": {"records": [{"attendance_machine_id": 4021}]}
        });
        Ok(serde_json::from_value(raw).unwrap())
    }

    async fn fetch_attendance(
        &self,
        _credential: &str,
        _machine_id: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<AttendanceResponse, PortalError> {
        let records = self.attendance_records.lock().unwrap().clone();
        Ok(serde_json::from_value(serde_json::json!({"result": {"records": records}})).unwrap())
    }

    async fn fetch_overview(&self, _credential: &str) -> Result<serde_json::Value, PortalError> {
        self.overview_calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({"result": []}))
    }
}

/// Short intervals so the tests run in real time without long sleeps.
fn test_config() -> PunchdConfig {
    PunchdConfig {
        portal: PortalConfig {
            domain: "portal.example.com".to_string(),
            base_url: "https://portal.example.com".to_string(),
            cookie_name: "session_id".to_string(),
            email_domain: "example.com".to_string(),
        },
        chat: ChatConfig {
            host: "chat.example.com".to_string(),
            mail_url: "https://mail.example.com/chat".to_string(),
        },
        refresh: RefreshConfig {
            debounce_ms: 150,
            retry_interval_ms: 200,
        },
        heartbeat: HeartbeatConfig {
            poll_interval_ms: 100,
            ping_timeout_ms: 80,
        },
        ui: UiConfig {
            script: "init();".to_string(),
            stylesheet: ".punchd {}".to_string(),
        },
    }
}

struct Harness {
    portal: Arc<StubPortal>,
    store: Arc<MemoryStore>,
    socket_path: PathBuf,
    shutdown: CancellationToken,
    _dir: tempfile::TempDir,
}

async fn start_daemon() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("punchd.sock");
    let config = test_config();

    let portal = Arc::new(StubPortal::default());
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
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
    let orchestrator = RefreshOrchestrator::new(
        session,
        portal.clone(),
        store.clone(),
        cookie,
        frames,
        &config,
    );

    let shutdown = CancellationToken::new();
    {
        let socket_path = socket_path.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server::run(&socket_path, orchestrator, bridge_rx, shutdown).await
        });
    }

    // Wait for the socket to appear
    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Harness {
        portal,
        store,
        socket_path,
        shutdown,
        _dir: dir,
    }
}

/// Raw JSONL client playing the browser-side host.
struct Host {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Host {
    async fn connect(harness: &Harness) -> Self {
        let stream = UnixStream::connect(&harness.socket_path).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, msg: serde_json::Value) {
        let mut line = msg.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> serde_json::Value {
        let mut line = String::new();
        let n = tokio::time::timeout(Duration::from_secs(3), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for daemon message")
            .unwrap();
        assert!(n > 0, "daemon closed the connection");
        serde_json::from_str(line.trim()).unwrap()
    }

    /// Next message that is not a heartbeat ping; pings are answered.
    async fn recv_skipping_pings(&mut self) -> serde_json::Value {
        loop {
            let msg = self.recv().await;
            if msg["type"] == "request" && msg["message"]["type"] == "ping" {
                self.send(serde_json::json!({
                    "type": "reply",
                    "id": msg["id"],
                    "result": true
                }))
                .await;
                continue;
            }
            return msg;
        }
    }

    async fn try_recv(&mut self, wait: Duration) -> Option<serde_json::Value> {
        let mut line = String::new();
        match tokio::time::timeout(wait, self.reader.read_line(&mut line)).await {
            Ok(Ok(n)) if n > 0 => Some(serde_json::from_str(line.trim()).unwrap()),
            _ => None,
        }
    }
}

fn today_record(check_in: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "date_check": time::format_date(time::today()),
        "check_in": check_in,
        "check_out": false
    })
}

#[tokio::test]
async fn test_chat_navigation_injects_ui() {
    let harness = start_daemon().await;
    let mut host = Host::connect(&harness).await;
    harness
        .portal
        .set_records(serde_json::json!([today_record("2025-06-02 01:12:44".into())]));

    host.send(serde_json::json!({
        "type": "cookie_changed",
        "domain": ".portal.example.com",
        "value": "tok"
    }))
    .await;
    host.send(serde_json::json!({
        "type": "navigation_completed",
        "tab_id": 5,
        "frame_id": 2,
        "url": "https://chat.example.com/room/12"
    }))
    .await;

    let msg = host.recv_skipping_pings().await;
    assert_eq!(msg["type"], "inject");
    assert_eq!(msg["tab_id"], 5);
    assert_eq!(msg["frame_id"], 2);
    assert_eq!(msg["bundle"]["script"], "init();");

    // The navigation's pipeline ran and persisted the refreshed state
    let status: LoginStatus =
        storage::get_typed(harness.store.as_ref(), keys::LOGIN_PORTAL_STATUS)
            .unwrap()
            .unwrap();
    assert_eq!(status, LoginStatus::SessionUp);
    assert!(harness.store.get(keys::EMPLOYEE_DATA).unwrap().is_some());

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_ready_frame_gets_countdown_on_reset() {
    let harness = start_daemon().await;
    let mut host = Host::connect(&harness).await;
    harness
        .portal
        .set_records(serde_json::json!([today_record("2025-06-02 01:12:44".into())]));

    host.send(serde_json::json!({
        "type": "cookie_changed",
        "domain": ".portal.example.com",
        "value": "tok"
    }))
    .await;
    host.send(serde_json::json!({
        "type": "setup_injector",
        "tab_id": 3,
        "frame_id": 0,
        "origin": "iframe"
    }))
    .await;
    host.send(serde_json::json!({
        "type": "injector_ready",
        "tab_id": 3
    }))
    .await;
    host.send(serde_json::json!({
        "type": "reset_portal_data",
        "id": "r1",
        "origin": "app"
    }))
    .await;

    let mut saw_countdown = false;
    let mut saw_result = false;
    while !(saw_countdown && saw_result) {
        let msg = host.recv_skipping_pings().await;
        match msg["type"].as_str() {
            Some("notify") => {
                assert_eq!(msg["message"]["type"], "refresh_countdown");
                assert_eq!(msg["tab_id"], 3);
                saw_countdown = true;
            }
            Some("reset_result") => {
                assert_eq!(msg["id"], "r1");
                assert_eq!(msg["refreshed"], true);
                saw_result = true;
            }
            other => panic!("unexpected message type: {:?}", other),
        }
    }

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_silent_frame_is_evicted_after_one_missed_ping() {
    let harness = start_daemon().await;
    let mut host = Host::connect(&harness).await;

    host.send(serde_json::json!({
        "type": "setup_injector",
        "tab_id": 8,
        "frame_id": 0,
        "origin": "app"
    }))
    .await;
    host.send(serde_json::json!({
        "type": "injector_ready",
        "tab_id": 8
    }))
    .await;

    // First heartbeat arrives; stay silent
    let msg = host.recv().await;
    assert_eq!(msg["type"], "request");
    assert_eq!(msg["message"]["type"], "ping");

    // The ping timeout evicts the frame and the empty registry stops the
    // poller, so no further pings show up
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(host.try_recv(Duration::from_millis(300)).await.is_none());

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_answered_pings_keep_the_frame_alive() {
    let harness = start_daemon().await;
    let mut host = Host::connect(&harness).await;

    host.send(serde_json::json!({
        "type": "setup_injector",
        "tab_id": 8,
        "frame_id": 0,
        "origin": "app"
    }))
    .await;
    host.send(serde_json::json!({
        "type": "injector_ready",
        "tab_id": 8
    }))
    .await;

    // Answer several consecutive heartbeats
    for _ in 0..3 {
        let msg = host.recv().await;
        assert_eq!(msg["message"]["type"], "ping");
        host.send(serde_json::json!({
            "type": "reply",
            "id": msg["id"],
            "result": true
        }))
        .await;
    }

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_cookie_burst_runs_one_refresh() {
    let harness = start_daemon().await;
    let mut host = Host::connect(&harness).await;
    harness
        .portal
        .set_records(serde_json::json!([today_record("2025-06-02 01:12:44".into())]));

    for value in ["a", "b", "c"] {
        host.send(serde_json::json!({
            "type": "cookie_changed",
            "domain": ".portal.example.com",
            "value": value
        }))
        .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Debounce window (150ms) plus pipeline time
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(harness.portal.overview_calls.load(Ordering::SeqCst), 1);

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_retry_until_check_in_appears() {
    let harness = start_daemon().await;
    let mut host = Host::connect(&harness).await;
    // Portal row exists but the check-in has not been pushed yet
    harness
        .portal
        .set_records(serde_json::json!([today_record(false.into())]));

    host.send(serde_json::json!({
        "type": "cookie_changed",
        "domain": ".portal.example.com",
        "value": "tok"
    }))
    .await;

    // First run fails after the debounce; the retry loop is now live
    tokio::time::sleep(Duration::from_millis(400)).await;
    let first = harness.portal.overview_calls.load(Ordering::SeqCst);
    assert!(first >= 1);

    harness
        .portal
        .set_records(serde_json::json!([today_record("2025-06-02 01:12:44".into())]));
    tokio::time::sleep(Duration::from_millis(600)).await;

    let status: LoginStatus =
        storage::get_typed(harness.store.as_ref(), keys::LOGIN_PORTAL_STATUS)
            .unwrap()
            .unwrap();
    assert_eq!(status, LoginStatus::SessionUp);

    // Loop stopped: the refresh count settles
    let settled = harness.portal.overview_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(harness.portal.overview_calls.load(Ordering::SeqCst), settled);

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_tab_close_stops_heartbeats() {
    let harness = start_daemon().await;
    let mut host = Host::connect(&harness).await;

    host.send(serde_json::json!({
        "type": "setup_injector",
        "tab_id": 4,
        "frame_id": 0,
        "origin": "app"
    }))
    .await;
    host.send(serde_json::json!({
        "type": "injector_ready",
        "tab_id": 4
    }))
    .await;

    // Prove the heartbeat is live, then close the tab
    let msg = host.recv().await;
    assert_eq!(msg["message"]["type"], "ping");
    host.send(serde_json::json!({
        "type": "reply",
        "id": msg["id"],
        "result": true
    }))
    .await;
    host.send(serde_json::json!({
        "type": "tab_closed",
        "tab_id": 4
    }))
    .await;

    // Drain any in-flight ping, then expect silence
    tokio::time::sleep(Duration::from_millis(250)).await;
    while let Some(msg) = host.try_recv(Duration::from_millis(50)).await {
        assert_eq!(msg["message"]["type"], "ping");
    }
    assert!(host.try_recv(Duration::from_millis(300)).await.is_none());

    harness.shutdown.cancel();
}
