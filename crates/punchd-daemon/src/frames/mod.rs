//! Registry of live UI frames with a polling heartbeat.
//!
//! A frame enters the registry on a qualifying navigation, gets the UI
//! bundle injected once, and flips `ready` when its instance reports in.
//! Ready frames are probed every poll interval; one unanswered ping is
//! enough to evict. The poller runs only while the registry is non-empty.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use punchd_core::config::HeartbeatConfig;

use crate::bridge::{BridgeHandle, FrameAddress, UiBundle, UiMessage};

#[derive(Debug, Clone, Copy)]
pub struct FrameRegistration {
    pub addr: FrameAddress,
    pub injected: bool,
    pub ready: bool,
}

#[derive(Default)]
struct Registry {
    frames: HashMap<FrameAddress, FrameRegistration>,
    poller_running: bool,
}

#[derive(Clone)]
pub struct FrameLifecycleManager {
    bridge: BridgeHandle,
    bundle: UiBundle,
    poll_interval: Duration,
    registry: Arc<Mutex<Registry>>,
}

impl FrameLifecycleManager {
    pub fn new(bridge: BridgeHandle, bundle: UiBundle, heartbeat: &HeartbeatConfig) -> Self {
        Self {
            bridge,
            bundle,
            poll_interval: heartbeat.poll_interval(),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Register a frame. Re-registering an already tracked address keeps
    /// its flags. Starts the heartbeat poller when it is not running.
    pub async fn add_frame(&self, addr: FrameAddress) {
        let start_poller = {
            let mut registry = self.registry.lock().await;
            registry.frames.entry(addr).or_insert(FrameRegistration {
                addr,
                injected: false,
                ready: false,
            });
            if registry.poller_running {
                false
            } else {
                registry.poller_running = true;
                true
            }
        };

        info!(event = "daemon.frames.added", frame = %addr);

        if start_poller {
            let manager = self.clone();
            tokio::spawn(async move { manager.run_heartbeat().await });
        }
    }

    /// Handshake from a mounted UI instance. The instance only knows its
    /// tab, so every registration in that tab becomes heartbeat-eligible.
    pub async fn mark_ready(&self, tab_id: u32) {
        let mut registry = self.registry.lock().await;
        let mut matched = false;
        for registration in registry.frames.values_mut() {
            if registration.addr.tab_id == tab_id {
                registration.ready = true;
                matched = true;
            }
        }
        if matched {
            info!(event = "daemon.frames.ready", tab_id = tab_id);
        } else {
            debug!(event = "daemon.frames.ready_unknown_tab", tab_id = tab_id);
        }
    }

    /// Drop every registration belonging to a closed tab.
    pub async fn remove_tab(&self, tab_id: u32) {
        let mut registry = self.registry.lock().await;
        let before = registry.frames.len();
        registry.frames.retain(|addr, _| addr.tab_id != tab_id);
        let removed = before - registry.frames.len();
        if removed > 0 {
            info!(event = "daemon.frames.tab_removed", tab_id = tab_id, frames = removed);
        }
    }

    /// Push the latest state to every tracked frame.
    ///
    /// Ready frames get a refresh notification. Frames never injected get
    /// the UI bundle and are marked injected. A frame that is injected
    /// but not yet ready has an injection in flight and is left alone.
    pub async fn inject_or_notify(&self) {
        let actions: Vec<(FrameAddress, bool)> = {
            let mut registry = self.registry.lock().await;
            let mut actions = Vec::new();
            for registration in registry.frames.values_mut() {
                if registration.ready {
                    actions.push((registration.addr, false));
                } else if !registration.injected {
                    registration.injected = true;
                    actions.push((registration.addr, true));
                }
            }
            actions
        };

        for (addr, inject) in actions {
            let sent = if inject {
                debug!(event = "daemon.frames.inject", frame = %addr);
                self.bridge.inject(addr, self.bundle.clone())
            } else {
                debug!(event = "daemon.frames.notify", frame = %addr);
                self.bridge.notify(addr, UiMessage::RefreshCountdown)
            };
            if let Err(e) = sent {
                warn!(event = "daemon.frames.dispatch_failed", frame = %addr, error = %e);
            }
        }
    }

    pub async fn frame_count(&self) -> usize {
        self.registry.lock().await.frames.len()
    }

    /// One poll cycle: ping every ready frame, evict the silent ones.
    /// Returns false when the registry is empty and polling should stop.
    async fn poll_once(&self) -> bool {
        let targets: Vec<FrameAddress> = {
            let registry = self.registry.lock().await;
            if registry.frames.is_empty() {
                return false;
            }
            registry
                .frames
                .values()
                .filter(|r| r.ready)
                .map(|r| r.addr)
                .collect()
        };

        let pings = targets.iter().map(|&addr| {
            let bridge = self.bridge.clone();
            async move { (addr, bridge.request(addr, UiMessage::Ping).await) }
        });

        let dead: Vec<FrameAddress> = join_all(pings)
            .await
            .into_iter()
            .filter_map(|(addr, result)| match result {
                Ok(_) => None,
                Err(e) => {
                    warn!(event = "daemon.frames.heartbeat_missed", frame = %addr, error = %e);
                    Some(addr)
                }
            })
            .collect();

        if !dead.is_empty() {
            let mut registry = self.registry.lock().await;
            for addr in dead {
                if registry.frames.remove(&addr).is_some() {
                    info!(event = "daemon.frames.evicted", frame = %addr);
                }
            }
        }

        true
    }

    async fn run_heartbeat(&self) {
        debug!(event = "daemon.frames.heartbeat_started");
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately, skip it so a freshly added
        // frame gets a full interval before its first probe
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.poll_once().await {
                continue;
            }

            // A frame may have registered between the empty observation in
            // poll_once and this lock; that add_frame saw poller_running
            // still set and relies on us to keep going.
            let mut registry = self.registry.lock().await;
            if registry.frames.is_empty() {
                registry.poller_running = false;
                debug!(event = "daemon.frames.heartbeat_stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    use crate::bridge::BridgeCommand;

    fn manager() -> (FrameLifecycleManager, mpsc::UnboundedReceiver<BridgeCommand>) {
        let (bridge, rx) = BridgeHandle::channel(Duration::from_millis(1_000));
        let bundle = UiBundle {
            script: "init();".to_string(),
            stylesheet: ".punchd {}".to_string(),
        };
        let heartbeat = HeartbeatConfig {
            poll_interval_ms: 2_000,
            ping_timeout_ms: 1_000,
        };
        (FrameLifecycleManager::new(bridge, bundle, &heartbeat), rx)
    }

    fn addr(tab_id: u32, frame_id: u32) -> FrameAddress {
        FrameAddress { tab_id, frame_id }
    }

    #[tokio::test]
    async fn test_add_frame_is_idempotent() {
        let (manager, _rx) = manager();
        manager.add_frame(addr(1, 0)).await;
        manager.add_frame(addr(1, 0)).await;
        assert_eq!(manager.frame_count().await, 1);
    }

    #[tokio::test]
    async fn test_re_adding_keeps_existing_flags() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(1, 0)).await;
        manager.inject_or_notify().await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            BridgeCommand::Inject { .. }
        ));

        // Re-registration must not reset `injected`
        manager.add_frame(addr(1, 0)).await;
        manager.inject_or_notify().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_inject_then_notify_after_ready() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(7, 3)).await;

        manager.inject_or_notify().await;
        match rx.recv().await.unwrap() {
            BridgeCommand::Inject { target, .. } => assert_eq!(target, addr(7, 3)),
            other => panic!("expected Inject, got: {:?}", other),
        }

        manager.mark_ready(7).await;
        manager.inject_or_notify().await;
        match rx.recv().await.unwrap() {
            BridgeCommand::Notify { target, message } => {
                assert_eq!(target, addr(7, 3));
                assert_eq!(message, UiMessage::RefreshCountdown);
            }
            other => panic!("expected Notify, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_injected_but_not_ready_is_left_alone() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(1, 0)).await;

        manager.inject_or_notify().await;
        let _ = rx.recv().await.unwrap();

        // Second pass while the handshake is still outstanding
        manager.inject_or_notify().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_tab_drops_all_its_frames() {
        let (manager, _rx) = manager();
        manager.add_frame(addr(1, 0)).await;
        manager.add_frame(addr(1, 4)).await;
        manager.add_frame(addr(2, 0)).await;

        manager.remove_tab(1).await;
        assert_eq!(manager.frame_count().await, 1);
    }

    #[tokio::test]
    async fn test_mark_ready_flips_every_frame_in_tab() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(1, 0)).await;
        manager.add_frame(addr(1, 4)).await;
        manager.mark_ready(1).await;

        manager.inject_or_notify().await;
        for _ in 0..2 {
            assert!(matches!(
                rx.recv().await.unwrap(),
                BridgeCommand::Notify { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_one_missed_ping_evicts() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(1, 0)).await;
        manager.mark_ready(1).await;

        let poll = tokio::spawn({
            let manager = manager.clone();
            async move { manager.poll_once().await }
        });

        match rx.recv().await.unwrap() {
            BridgeCommand::Request { reply, message, .. } => {
                assert_eq!(message, UiMessage::Ping);
                // Dropping the reply slot simulates a dead frame
                drop(reply);
            }
            other => panic!("expected Request, got: {:?}", other),
        }

        assert!(poll.await.unwrap());
        assert_eq!(manager.frame_count().await, 0);
    }

    #[tokio::test]
    async fn test_answered_ping_keeps_frame() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(1, 0)).await;
        manager.mark_ready(1).await;

        let poll = tokio::spawn({
            let manager = manager.clone();
            async move { manager.poll_once().await }
        });

        match rx.recv().await.unwrap() {
            BridgeCommand::Request { reply, .. } => {
                reply.send(Ok(serde_json::json!(true))).unwrap();
            }
            other => panic!("expected Request, got: {:?}", other),
        }

        assert!(poll.await.unwrap());
        assert_eq!(manager.frame_count().await, 1);
    }

    #[tokio::test]
    async fn test_not_ready_frames_are_not_pinged() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(1, 0)).await;

        assert!(manager.poll_once().await);
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.frame_count().await, 1);
    }

    #[tokio::test]
    async fn test_poll_reports_empty_registry() {
        let (manager, _rx) = manager();
        assert!(!manager.poll_once().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_added_while_poller_winds_down_keeps_heartbeat() {
        let (manager, mut rx) = manager();
        manager.add_frame(addr(1, 0)).await;
        manager.remove_tab(1).await;

        // Wedge the registry so the next poll cycle queues on the fair
        // mutex, then queue a registration right behind it. The poll sees
        // an empty registry; the add lands before the poller's exit check.
        let guard = manager.registry.lock().await;
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let add = tokio::spawn({
            let manager = manager.clone();
            async move { manager.add_frame(addr(9, 0)).await }
        });
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        drop(guard);
        add.await.unwrap();

        // The frame saw poller_running == true and must still be probed
        manager.mark_ready(9).await;
        match rx.recv().await.unwrap() {
            BridgeCommand::Request { target, message, reply } => {
                assert_eq!(target, addr(9, 0));
                assert_eq!(message, UiMessage::Ping);
                reply.send(Ok(serde_json::json!(true))).unwrap();
            }
            other => panic!("expected Request, got: {:?}", other),
        }

        assert!(manager.registry.lock().await.poller_running);
        assert_eq!(manager.frame_count().await, 1);
    }
}
