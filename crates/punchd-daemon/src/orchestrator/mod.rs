//! Top-level refresh coordinator.
//!
//! Reacts to browser events and UI requests, drives the session cache and
//! portal client, persists results, and tells the frame manager to push
//! the new state. Exactly one pipeline run is in progress at any time:
//! a trigger arriving while `Processing` is dropped, never queued.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use punchd_core::attendance::{self, DailyRecord};
use punchd_core::config::{ChatConfig, PunchdConfig};
use punchd_core::storage::{self, KeyValueStore, LoginStatus, StorageError, keys};
use punchd_core::time;

use crate::bridge::{FrameAddress, UiOrigin};
use crate::browser::{BrowserEvent, CookieState, is_chat_navigation};
use crate::frames::FrameLifecycleManager;
use crate::portal::{PortalClient, PortalError};
use crate::session::SessionCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Processing,
}

/// What caused a refresh attempt; used for logs and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
    Navigation,
    CookieChange,
    UserRequest,
    Retry,
}

impl RefreshOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            RefreshOrigin::Navigation => "navigation",
            RefreshOrigin::CookieChange => "cookie_change",
            RefreshOrigin::UserRequest => "user_request",
            RefreshOrigin::Retry => "retry",
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Portal(#[from] PortalError),
}

pub struct RefreshOrchestrator<P> {
    session: SessionCache<P>,
    portal: Arc<P>,
    store: Arc<dyn KeyValueStore>,
    cookie: CookieState,
    frames: FrameLifecycleManager,
    portal_domain: String,
    chat: ChatConfig,
    debounce: Duration,
    retry_interval: Duration,
    state: Arc<Mutex<RefreshState>>,
    debounce_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    retry_token: Arc<Mutex<Option<CancellationToken>>>,
}

impl<P> Clone for RefreshOrchestrator<P> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            portal: self.portal.clone(),
            store: self.store.clone(),
            cookie: self.cookie.clone(),
            frames: self.frames.clone(),
            portal_domain: self.portal_domain.clone(),
            chat: self.chat.clone(),
            debounce: self.debounce,
            retry_interval: self.retry_interval,
            state: self.state.clone(),
            debounce_task: self.debounce_task.clone(),
            retry_token: self.retry_token.clone(),
        }
    }
}

impl<P: PortalClient> RefreshOrchestrator<P> {
    pub fn new(
        session: SessionCache<P>,
        portal: Arc<P>,
        store: Arc<dyn KeyValueStore>,
        cookie: CookieState,
        frames: FrameLifecycleManager,
        config: &PunchdConfig,
    ) -> Self {
        Self {
            session,
            portal,
            store,
            cookie,
            frames,
            portal_domain: config.portal.domain.clone(),
            chat: config.chat.clone(),
            debounce: config.refresh.debounce(),
            retry_interval: config.refresh.retry_interval(),
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            debounce_task: Arc::new(Mutex::new(None)),
            retry_token: Arc::new(Mutex::new(None)),
        }
    }

    /// React to one browser event forwarded by the host.
    pub async fn handle_event(&self, event: BrowserEvent) {
        match event {
            BrowserEvent::CookieChanged { domain, value } => {
                if !domain.contains(&self.portal_domain) {
                    return;
                }
                debug!(event = "daemon.orchestrator.cookie_changed", domain = %domain);
                self.cookie.update(value);
                self.schedule_cookie_refresh();
            }
            BrowserEvent::NavigationCompleted {
                tab_id,
                frame_id,
                url,
            } => {
                if !is_chat_navigation(&url, &self.chat) {
                    return;
                }
                info!(event = "daemon.orchestrator.chat_navigation", tab_id = tab_id);
                let addr = FrameAddress { tab_id, frame_id };
                self.cancel_retry();
                self.frames.add_frame(addr).await;
                self.session.set_fallback_frame(addr).await;
                self.refresh(RefreshOrigin::Navigation).await;
            }
            BrowserEvent::TabClosed { tab_id } => {
                self.frames.remove_tab(tab_id).await;
            }
        }
    }

    /// A UI instance announced itself as the active host for its frame.
    pub async fn handle_setup(&self, addr: FrameAddress, origin: UiOrigin) {
        debug!(event = "daemon.orchestrator.ui_setup", frame = %addr, origin = ?origin);
        self.frames.add_frame(addr).await;
        if origin == UiOrigin::Iframe {
            self.session.set_fallback_frame(addr).await;
        }
    }

    /// A mounted UI instance finished its handshake.
    pub async fn handle_ready(&self, tab_id: u32) {
        self.frames.mark_ready(tab_id).await;
    }

    /// Explicit user request to drop all cached portal data and refetch.
    ///
    /// Returns whether a refresh actually ran (a run already in progress
    /// makes this a no-op apart from the clear).
    pub async fn handle_reset(&self) -> bool {
        info!(event = "daemon.orchestrator.reset_requested");
        for &key in keys::ALL {
            if let Err(e) = self.store.remove(key) {
                warn!(event = "daemon.orchestrator.reset_clear_failed", key = key, error = %e);
            }
        }
        self.session.invalidate_email().await;
        self.session.invalidate_user_id().await;
        self.refresh(RefreshOrigin::UserRequest).await.is_some()
    }

    /// Run one refresh attempt. `None` means the trigger was dropped by
    /// the mutex; `Some(success)` reports whether today's check-in is now
    /// persisted. Failure arms the retry loop, success disarms it.
    pub async fn refresh(&self, origin: RefreshOrigin) -> Option<bool> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == RefreshState::Processing {
                info!(
                    event = "daemon.orchestrator.refresh_dropped",
                    origin = origin.as_str()
                );
                return None;
            }
            *state = RefreshState::Processing;
        }

        info!(
            event = "daemon.orchestrator.refresh_started",
            origin = origin.as_str()
        );

        let success = match self.pipeline().await {
            Ok(success) => success,
            Err(e) => {
                error!(event = "daemon.orchestrator.pipeline_failed", error = %e);
                // A mid-pipeline failure downgrades the login state
                if let Err(e) = storage::set_typed(
                    self.store.as_ref(),
                    keys::LOGIN_PORTAL_STATUS,
                    &LoginStatus::SessionExpired,
                ) {
                    warn!(event = "daemon.orchestrator.status_persist_failed", error = %e);
                }
                false
            }
        };

        // The UI hears about every attempt, failed ones included
        self.frames.inject_or_notify().await;

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            *state = RefreshState::Idle;
        }

        if success {
            self.cancel_retry();
        } else {
            self.ensure_retry_loop();
        }

        info!(
            event = "daemon.orchestrator.refresh_finished",
            origin = origin.as_str(),
            success = success
        );
        Some(success)
    }

    /// The refresh pipeline proper. Success means today's daily record is
    /// persisted with a check-in; a record without one counts as "not yet
    /// pushed by the portal" and feeds the retry loop.
    async fn pipeline(&self) -> Result<bool, PipelineError> {
        let store = self.store.as_ref();

        let credential = self.session.credential();
        if credential.is_empty() {
            debug!(event = "daemon.orchestrator.no_credential");
            storage::set_typed(store, keys::LOGIN_PORTAL_STATUS, &LoginStatus::NoCookie)?;
            return Ok(false);
        }

        let today_date = time::today();
        let today = time::format_date(today_date);

        let stored: Option<DailyRecord> = storage::get_typed(store, keys::EMPLOYEE_DATA)?;
        if attendance::is_fresh(stored.as_ref(), &today) {
            debug!(event = "daemon.orchestrator.attendance_fresh", date = %today);
            storage::set_typed(store, keys::LOGIN_PORTAL_STATUS, &LoginStatus::SessionUp)?;
            return Ok(true);
        }

        let email = self.session.email().await;
        if email.is_empty() {
            warn!(event = "daemon.orchestrator.email_unresolved");
            storage::set_typed(store, keys::LOGIN_PORTAL_STATUS, &LoginStatus::SessionExpired)?;
            return Ok(false);
        }

        let machine_id = self.session.user_id().await;
        if machine_id.is_empty() {
            warn!(event = "daemon.orchestrator.machine_id_unresolved");
            storage::set_typed(store, keys::LOGIN_PORTAL_STATUS, &LoginStatus::SessionExpired)?;
            return Ok(false);
        }

        let overview = self.portal.fetch_overview(&credential).await?;
        storage::set_typed(store, keys::EMPLOYEE_ATTENDANCE, &overview)?;
        if let Some(message) = overview.pointer("/result/go_home_message") {
            storage::set_typed(store, keys::GO_HOME_MESSAGE, message)?;
        }

        let (from, to) = time::daily_window(today_date);
        let daily = self
            .portal
            .fetch_attendance(&credential, &machine_id, from, to)
            .await?;
        if !daily.is_ok() {
            warn!(
                event = "daemon.orchestrator.daily_fetch_rejected",
                error = %daily.error_text()
            );
            storage::set_typed(store, keys::LOGIN_PORTAL_STATUS, &LoginStatus::SessionExpired)?;
            return Ok(false);
        }
        let record = daily.result.as_ref().and_then(|r| r.first()).cloned();
        match &record {
            Some(r) => storage::set_typed(store, keys::EMPLOYEE_DATA, r)?,
            // An empty day must not leave yesterday's record behind
            None => store.remove(keys::EMPLOYEE_DATA)?,
        }

        let (month_from, month_to) = time::month_window(today_date);
        let monthly = self
            .portal
            .fetch_attendance(&credential, &machine_id, month_from, month_to)
            .await?;
        if !monthly.is_ok() {
            warn!(
                event = "daemon.orchestrator.monthly_fetch_rejected",
                error = %monthly.error_text()
            );
            storage::set_typed(store, keys::LOGIN_PORTAL_STATUS, &LoginStatus::SessionExpired)?;
            return Ok(false);
        }
        let month_records = monthly.result.map(|r| r.records).unwrap_or_default();
        storage::set_typed(store, keys::EMPLOYEE_MONTH_DATA, &month_records)?;

        storage::set_typed(store, keys::LOGIN_PORTAL_STATUS, &LoginStatus::SessionUp)?;

        Ok(attendance::is_fresh(record.as_ref(), &today))
    }

    /// Trailing debounce for cookie bursts: each change pushes the single
    /// pending run out by the full window.
    fn schedule_cookie_refresh(&self) {
        let mut slot = self
            .debounce_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = slot.take() {
            pending.abort();
        }
        let orchestrator = self.clone();
        let delay = self.debounce;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            orchestrator.refresh(RefreshOrigin::CookieChange).await;
        }));
    }

    /// Arm the fixed-interval retry loop if it is not already running.
    fn ensure_retry_loop(&self) {
        let mut slot = self.retry_token.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = slot.as_ref() {
            if !token.is_cancelled() {
                return;
            }
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());

        let orchestrator = self.clone();
        let interval = self.retry_interval;
        // Boxed so the spawned future's type does not recurse into refresh
        let task: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            info!(
                event = "daemon.orchestrator.retry_armed",
                interval_ms = interval.as_millis() as u64
            );
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if orchestrator.refresh(RefreshOrigin::Retry).await == Some(true) {
                            break;
                        }
                    }
                }
            }
            info!(event = "daemon.orchestrator.retry_stopped");
        });
        tokio::spawn(task);
    }

    fn cancel_retry(&self) {
        let mut slot = self.retry_token.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = slot.take() {
            token.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn force_processing(&self) {
        *self.state.lock().unwrap() = RefreshState::Processing;
    }

    #[cfg(test)]
    pub(crate) fn retry_armed(&self) -> bool {
        self.retry_token
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }
}
