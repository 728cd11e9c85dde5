//! Staleness-aware cache of the user's session identity.
//!
//! Owns the email and numeric attendance id, each carried as a
//! [`CachedValue`] with an explicit status. At most one fetch per value is
//! in flight at any time: a fetch registers itself in the pending set and
//! removes itself on every exit path, and readers that find a `Loading`
//! value await the in-flight fetch instead of starting another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use punchd_core::config::PortalConfig;
use punchd_core::storage::{self, KeyValueStore, keys};

use crate::bridge::{BridgeHandle, FrameAddress, UiMessage};
use crate::browser::CookieState;
use crate::portal::PortalClient;
use crate::session::parse;

/// Lifecycle of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Never fetched.
    Initial,
    /// Externally invalidated; serve the old value, refetch in background.
    Stale,
    /// A fetch is in flight.
    Loading,
    /// Last fetch succeeded.
    Fresh,
    /// Last fetch failed; next read clears and refetches.
    Error,
}

#[derive(Debug, Clone)]
pub struct CachedValue<T> {
    pub value: T,
    pub status: CacheStatus,
}

impl<T: Default> Default for CachedValue<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            status: CacheStatus::Initial,
        }
    }
}

/// Logical id of a deduplicated fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FetchId {
    UserEmail,
    UserId,
}

#[derive(Default)]
struct CacheInner {
    email: CachedValue<String>,
    uid: CachedValue<String>,
    /// Receivers resolve when the matching fetch completes (or is dropped).
    pending: HashMap<FetchId, watch::Receiver<bool>>,
    /// Companion chat frame used by the fallback email extraction.
    fallback_frame: Option<FrameAddress>,
}

pub struct SessionCache<P> {
    portal: Arc<P>,
    store: Arc<dyn KeyValueStore>,
    cookie: CookieState,
    bridge: BridgeHandle,
    email_domain: String,
    inner: Arc<Mutex<CacheInner>>,
}

// Manual impl: P itself need not be Clone behind the Arc.
impl<P> Clone for SessionCache<P> {
    fn clone(&self) -> Self {
        Self {
            portal: self.portal.clone(),
            store: self.store.clone(),
            cookie: self.cookie.clone(),
            bridge: self.bridge.clone(),
            email_domain: self.email_domain.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<P: PortalClient> SessionCache<P> {
    pub fn new(
        portal: Arc<P>,
        store: Arc<dyn KeyValueStore>,
        cookie: CookieState,
        bridge: BridgeHandle,
        portal_config: &PortalConfig,
    ) -> Self {
        Self {
            portal,
            store,
            cookie,
            bridge,
            email_domain: portal_config.email_domain.clone(),
            inner: Arc::new(Mutex::new(CacheInner::default())),
        }
    }

    /// The session credential derived from the current cookie. No network.
    pub fn credential(&self) -> String {
        self.cookie.credential()
    }

    /// Record which frame the fallback email extraction should ask.
    pub async fn set_fallback_frame(&self, frame: FrameAddress) {
        let mut inner = self.inner.lock().await;
        inner.fallback_frame = Some(frame);
    }

    /// Force a refetch of the email on its next read.
    pub async fn invalidate_email(&self) {
        let mut inner = self.inner.lock().await;
        if matches!(inner.email.status, CacheStatus::Fresh | CacheStatus::Error) {
            inner.email.status = CacheStatus::Stale;
        }
    }

    /// Force a refetch of the numeric id on its next read.
    pub async fn invalidate_user_id(&self) {
        let mut inner = self.inner.lock().await;
        if matches!(inner.uid.status, CacheStatus::Fresh | CacheStatus::Error) {
            inner.uid.status = CacheStatus::Stale;
        }
    }

    /// Resolve the user's email, empty when currently unknown.
    ///
    /// `Error` clears the value, schedules a background refetch, and
    /// returns empty so callers treat the email as a retryable absence
    /// rather than blocking on a failing network call. `Loading` awaits
    /// the in-flight fetch. `Stale` serves the old value and refetches in
    /// the background. `Initial` fetches first.
    pub async fn email(&self) -> String {
        let waiter = {
            let mut inner = self.inner.lock().await;
            match inner.email.status {
                CacheStatus::Error => {
                    inner.email.value.clear();
                    let cache = self.clone();
                    tokio::spawn(async move { cache.fetch_email().await });
                    return String::new();
                }
                CacheStatus::Stale => {
                    let cache = self.clone();
                    tokio::spawn(async move { cache.fetch_email().await });
                    return inner.email.value.clone();
                }
                CacheStatus::Fresh => return inner.email.value.clone(),
                CacheStatus::Loading => inner.pending.get(&FetchId::UserEmail).cloned(),
                CacheStatus::Initial => None,
            }
        };

        match waiter {
            Some(mut rx) => {
                // Resolves on completion signal or when the fetch drops its sender
                let _ = rx.changed().await;
            }
            None => self.fetch_email().await,
        }

        let inner = self.inner.lock().await;
        inner.email.value.clone()
    }

    /// Resolve the numeric attendance id, empty when currently unknown.
    ///
    /// Same four-branch policy as [`Self::email`], and additionally empty
    /// whenever the email itself cannot be resolved.
    pub async fn user_id(&self) -> String {
        let waiter = {
            let mut inner = self.inner.lock().await;
            match inner.uid.status {
                CacheStatus::Error => {
                    inner.uid.value.clear();
                    let cache = self.clone();
                    tokio::spawn(async move { cache.fetch_user_id().await });
                    return String::new();
                }
                CacheStatus::Stale => {
                    let cache = self.clone();
                    tokio::spawn(async move { cache.fetch_user_id().await });
                    return inner.uid.value.clone();
                }
                CacheStatus::Fresh => return inner.uid.value.clone(),
                CacheStatus::Loading => inner.pending.get(&FetchId::UserId).cloned(),
                CacheStatus::Initial => None,
            }
        };

        match waiter {
            Some(mut rx) => {
                let _ = rx.changed().await;
            }
            None => self.fetch_user_id().await,
        }

        let inner = self.inner.lock().await;
        inner.uid.value.clone()
    }

    /// Fetch and cache the user's email.
    ///
    /// Primary path: portal homepage session-info script. Fallback: ask
    /// the companion chat frame for its page text and scan for an
    /// organization-domain email. The resolved value (possibly empty) is
    /// persisted to the store on every completion.
    pub async fn fetch_email(&self) {
        let credential = self.cookie.credential();
        if credential.is_empty() {
            debug!(event = "daemon.session.email_fetch_no_credential");
            return;
        }

        let completion = {
            let mut inner = self.inner.lock().await;
            if let Some(rx) = inner.pending.get(&FetchId::UserEmail) {
                // Another fetch is in flight, join it instead
                let mut rx = rx.clone();
                drop(inner);
                let _ = rx.changed().await;
                return;
            }
            let (tx, rx) = watch::channel(false);
            inner.pending.insert(FetchId::UserEmail, rx);
            inner.email.status = CacheStatus::Loading;
            tx
        };

        let resolved = match self.portal.fetch_homepage(&credential).await {
            Ok(html) => match parse::session_info_email(&html) {
                Some(email) => Some(email),
                None => {
                    warn!(
                        event = "daemon.session.email_parse_failed",
                        "No session-info username in homepage, using chat-tab fallback"
                    );
                    self.extract_email_fallback().await
                }
            },
            Err(e) => {
                warn!(
                    event = "daemon.session.email_fetch_failed",
                    error = %e,
                    "Homepage fetch failed, using chat-tab fallback"
                );
                self.extract_email_fallback().await
            }
        };

        let mut inner = self.inner.lock().await;
        match resolved {
            Some(email) => {
                info!(event = "daemon.session.email_resolved");
                inner.email.value = email;
                inner.email.status = CacheStatus::Fresh;
            }
            None => {
                inner.email.status = CacheStatus::Error;
            }
        }
        inner.pending.remove(&FetchId::UserEmail);

        // Persisted on both outcomes so the UI sees the latest known value
        if let Err(e) =
            storage::set_typed(self.store.as_ref(), keys::USER_EMAIL, &inner.email.value)
        {
            warn!(event = "daemon.session.email_persist_failed", error = %e);
        }

        let _ = completion.send(true);
    }

    /// Fetch and cache the numeric attendance id for the resolved email.
    pub async fn fetch_user_id(&self) {
        let email = self.email().await;
        if email.is_empty() {
            debug!(event = "daemon.session.uid_fetch_no_email");
            return;
        }

        let completion = {
            let mut inner = self.inner.lock().await;
            if let Some(rx) = inner.pending.get(&FetchId::UserId) {
                let mut rx = rx.clone();
                drop(inner);
                let _ = rx.changed().await;
                return;
            }
            let (tx, rx) = watch::channel(false);
            inner.pending.insert(FetchId::UserId, rx);
            inner.uid.status = CacheStatus::Loading;
            tx
        };

        let credential = self.cookie.credential();
        let resolved = match self.portal.search_employee(&credential, &email).await {
            Ok(response) if response.is_ok() => response
                .result
                .as_ref()
                .and_then(|r| r.first())
                .and_then(|record| record.attendance_machine_id.clone()),
            Ok(response) => {
                warn!(
                    event = "daemon.session.uid_fetch_rejected",
                    error = %response.error_text()
                );
                None
            }
            Err(e) => {
                warn!(event = "daemon.session.uid_fetch_failed", error = %e);
                None
            }
        };

        let mut inner = self.inner.lock().await;
        match resolved {
            Some(uid) => {
                info!(event = "daemon.session.uid_resolved", uid = %uid);
                inner.uid.value = uid;
                inner.uid.status = CacheStatus::Fresh;
            }
            None => {
                inner.uid.status = CacheStatus::Error;
            }
        }
        inner.pending.remove(&FetchId::UserId);

        let _ = completion.send(true);
    }

    async fn extract_email_fallback(&self) -> Option<String> {
        let target = {
            let inner = self.inner.lock().await;
            inner.fallback_frame
        };

        let Some(target) = target else {
            debug!(event = "daemon.session.email_fallback_no_frame");
            return None;
        };

        match self.bridge.request(target, UiMessage::CollectPageText).await {
            Ok(value) => {
                let text = value.as_str()?.to_string();
                parse::domain_email(&text, &self.email_domain)
            }
            Err(e) => {
                warn!(event = "daemon.session.email_fallback_failed", error = %e);
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn email_status(&self) -> CacheStatus {
        self.inner.lock().await.email.status
    }

    #[cfg(test)]
    pub(crate) async fn uid_status(&self) -> CacheStatus {
        self.inner.lock().await.uid.status
    }
}
