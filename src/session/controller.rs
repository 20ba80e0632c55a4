//! Session lifecycle controller
//!
//! A single tokio task owns all session state: phase, the persisted key
//! store, and the timer set. Callers interact through [`SessionHandle`];
//! every mutation is serialized through the task's command channel, so no
//! locking is needed and the single-writer invariant holds by construction.
//!
//! Two deadlines drive correctness: a warning at `expires_at - 60s` and an
//! expiry at `expires_at`, both on the monotonic clock. A separate 1-second
//! tick republishes the remaining-time snapshot for display and never causes
//! a transition. Login and refresh replace the whole timer set; at most one
//! set is armed at a time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::session::store::{SessionStore, SessionUser};
use crate::types::{PorticoError, Result};

/// Seconds before expiry at which the warning fires
pub const WARNING_LEAD_SECONDS: u64 = 60;

/// Default interactive session lifetime (5 minutes)
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 300;

/// Lifecycle states of the client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    LoggedOut,
    Active,
    Warning,
    Expired,
}

/// User-facing notice attached to a terminal transition.
///
/// A failed refresh is surfaced distinctly from a plain expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionNotice {
    Expired,
    RefreshFailed,
}

/// Point-in-time view of the session, published over a watch channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<SessionUser>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Display-only countdown; expiry correctness is owned by the deadline
    pub remaining_seconds: u64,
    pub notice: Option<SessionNotice>,
}

impl SessionSnapshot {
    fn logged_out() -> Self {
        Self {
            phase: SessionPhase::LoggedOut,
            user: None,
            expires_at: None,
            remaining_seconds: 0,
            notice: None,
        }
    }
}

/// Collaborator that grants a new expiry on refresh.
///
/// Called at most once per user-initiated refresh; the controller never
/// retries on its own.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, user: &SessionUser) -> Result<DateTime<Utc>>;
}

enum Command {
    Login {
        user: SessionUser,
        expires_at: DateTime<Utc>,
        reply: oneshot::Sender<()>,
    },
    StoreArtifacts {
        jwt_token: String,
        encrypted_payload: String,
    },
    Refresh {
        reply: oneshot::Sender<Result<DateTime<Utc>>>,
    },
    Logout {
        reply: oneshot::Sender<()>,
    },
    ReadKey {
        key: String,
        reply: oneshot::Sender<Option<String>>,
    },
}

/// Cloneable handle to the controller task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Begin a session and arm the warning/expiry timer set.
    pub async fn login(&self, user: SessionUser, expires_at: DateTime<Utc>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Login {
            user,
            expires_at,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| PorticoError::Internal("session controller stopped".into()))
    }

    /// Attach handshake artifacts (token, encrypted payload) to the session.
    pub async fn store_artifacts(&self, jwt_token: String, encrypted_payload: String) -> Result<()> {
        self.send(Command::StoreArtifacts {
            jwt_token,
            encrypted_payload,
        })
        .await
    }

    /// User-initiated refresh. On success returns the new expiry; on
    /// failure the session is already expired by the time this returns.
    pub async fn refresh(&self) -> Result<DateTime<Utc>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Refresh { reply }).await?;
        rx.await
            .map_err(|_| PorticoError::Internal("session controller stopped".into()))?
    }

    /// Explicit logout: clears all persisted keys and cancels all timers.
    pub async fn logout(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Logout { reply }).await?;
        rx.await
            .map_err(|_| PorticoError::Internal("session controller stopped".into()))
    }

    /// Read one of the persisted flat keys by name.
    pub async fn read_key(&self, key: &str) -> Result<Option<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReadKey {
            key: key.to_string(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| PorticoError::Internal("session controller stopped".into()))
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot updates (display countdown consumers).
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| PorticoError::Internal("session controller stopped".into()))
    }
}

/// Spawns the controller task and returns its handle.
pub struct SessionController;

impl SessionController {
    pub fn spawn(refresher: Arc<dyn SessionRefresher>) -> SessionHandle {
        let (tx, rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::logged_out());

        let actor = Actor {
            store: SessionStore::new(),
            phase: SessionPhase::LoggedOut,
            notice: None,
            warning_at: None,
            expiry_at: None,
            refresher,
            snapshot_tx,
        };
        tokio::spawn(actor.run(rx));

        SessionHandle { tx, snapshot_rx }
    }
}

struct Actor {
    store: SessionStore,
    phase: SessionPhase,
    notice: Option<SessionNotice>,
    /// Monotonic deadline for the warning event, when armed
    warning_at: Option<Instant>,
    /// Monotonic deadline for the expiry event, when armed
    expiry_at: Option<Instant>,
    refresher: Arc<dyn SessionRefresher>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut tick = interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let warning_deadline = self.warning_at;
            let expiry_deadline = self.expiry_at;
            let session_live =
                matches!(self.phase, SessionPhase::Active | SessionPhase::Warning);

            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd).await,
                        None => break,
                    }
                }
                _ = sleep_until(warning_deadline.unwrap_or_else(Instant::now)),
                    if warning_deadline.is_some() =>
                {
                    self.fire_warning();
                }
                _ = sleep_until(expiry_deadline.unwrap_or_else(Instant::now)),
                    if expiry_deadline.is_some() =>
                {
                    self.fire_expiry();
                }
                _ = tick.tick(), if session_live => {
                    // display countdown only; never transitions state
                    self.publish();
                }
            }
        }
        debug!("session controller stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Login {
                user,
                expires_at,
                reply,
            } => {
                info!(user_id = %user.user_id, %expires_at, "session login");
                self.store.create(user, expires_at);
                self.notice = None;
                self.phase = SessionPhase::Active;
                self.arm_timers(expires_at);
                self.publish();
                let _ = reply.send(());
            }
            Command::StoreArtifacts {
                jwt_token,
                encrypted_payload,
            } => {
                self.store.set_artifacts(jwt_token, encrypted_payload);
                self.publish();
            }
            Command::Refresh { reply } => {
                let result = self.refresh().await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::Logout { reply } => {
                info!("session logout");
                self.clear_session(SessionPhase::LoggedOut, None);
                self.publish();
                let _ = reply.send(());
            }
            Command::ReadKey { key, reply } => {
                let _ = reply.send(self.store.get(&key));
            }
        }
    }

    async fn refresh(&mut self) -> Result<DateTime<Utc>> {
        if !matches!(self.phase, SessionPhase::Active | SessionPhase::Warning) {
            return Err(PorticoError::Unauthorized(
                "no active session to refresh".into(),
            ));
        }

        let user = match self.store.user() {
            Some(u) => u.clone(),
            None => {
                return Err(PorticoError::Internal(
                    "session state missing user".into(),
                ))
            }
        };

        let outcome = self.refresher.refresh(&user).await;

        // The session may have run out while the call was in flight; a late
        // success must not revive it.
        let lapsed = self
            .expiry_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(true);

        match outcome {
            Ok(new_expiry) if !lapsed => {
                info!(%new_expiry, "session refreshed");
                self.store.set_expiry(new_expiry);
                self.notice = None;
                self.phase = SessionPhase::Active;
                self.arm_timers(new_expiry);
                Ok(new_expiry)
            }
            Ok(stale) => {
                debug!(%stale, "refresh response arrived after expiry, ignoring");
                self.clear_session(SessionPhase::Expired, Some(SessionNotice::Expired));
                Err(PorticoError::Unauthorized("session already expired".into()))
            }
            Err(e) => {
                warn!("session refresh failed: {}", e);
                self.clear_session(SessionPhase::Expired, Some(SessionNotice::RefreshFailed));
                Err(e)
            }
        }
    }

    /// Replace the timer set from a new wall-clock expiry. The previous
    /// warning and expiry deadlines are always dropped first.
    fn arm_timers(&mut self, expires_at: DateTime<Utc>) {
        let until_expiry = (expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let expiry_at = Instant::now() + until_expiry;
        self.expiry_at = Some(expiry_at);

        let lead = Duration::from_secs(WARNING_LEAD_SECONDS);
        if until_expiry > lead {
            self.warning_at = Some(expiry_at - lead);
        } else {
            // already inside the warning window
            self.warning_at = None;
            self.phase = SessionPhase::Warning;
        }
    }

    fn fire_warning(&mut self) {
        self.warning_at = None;
        if self.phase == SessionPhase::Active {
            debug!("session warning window entered");
            self.phase = SessionPhase::Warning;
            self.publish();
        }
    }

    fn fire_expiry(&mut self) {
        info!("session expired");
        self.clear_session(SessionPhase::Expired, Some(SessionNotice::Expired));
        self.publish();
    }

    /// Terminal cleanup: drop all four persisted keys in one step and
    /// disarm every timer.
    fn clear_session(&mut self, phase: SessionPhase, notice: Option<SessionNotice>) {
        self.store.clear();
        self.warning_at = None;
        self.expiry_at = None;
        self.phase = phase;
        self.notice = notice;
    }

    fn publish(&self) {
        let remaining_seconds = self
            .expiry_at
            .map(|d| d.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0);

        let _ = self.snapshot_tx.send(SessionSnapshot {
            phase: self.phase,
            user: self.store.user().cloned(),
            expires_at: self.store.expires_at(),
            remaining_seconds,
            notice: self.notice,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{
        KEY_ENCRYPTED_PAYLOAD, KEY_JWT_TOKEN, KEY_SESSION_EXPIRY, KEY_USER,
    };
    use chrono::Duration as ChronoDuration;
    use tokio::time::advance;

    struct FixedRefresher {
        extend_by: ChronoDuration,
        fail: bool,
    }

    #[async_trait]
    impl SessionRefresher for FixedRefresher {
        async fn refresh(&self, _user: &SessionUser) -> Result<DateTime<Utc>> {
            if self.fail {
                Err(PorticoError::Unauthorized("refresh denied".into()))
            } else {
                Ok(Utc::now() + self.extend_by)
            }
        }
    }

    /// Grants the refresh, but only after a delay.
    struct SlowRefresher {
        delay: std::time::Duration,
        extend_by: ChronoDuration,
    }

    #[async_trait]
    impl SessionRefresher for SlowRefresher {
        async fn refresh(&self, _user: &SessionUser) -> Result<DateTime<Utc>> {
            tokio::time::sleep(self.delay).await;
            Ok(Utc::now() + self.extend_by)
        }
    }

    fn test_user() -> SessionUser {
        SessionUser {
            user_id: "u1".into(),
            username: "alice".into(),
        }
    }

    fn spawn_with(fail: bool) -> SessionHandle {
        SessionController::spawn(Arc::new(FixedRefresher {
            extend_by: ChronoDuration::minutes(5),
            fail,
        }))
    }

    /// Nudge the paused clock so spawned tasks and timers settle.
    async fn settle() {
        advance(std::time::Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_schedules_warning_then_expiry() {
        let handle = spawn_with(false);
        handle
            .login(test_user(), Utc::now() + ChronoDuration::minutes(5))
            .await
            .unwrap();
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Active);

        // Warning fires at expires_at - 60s = +4min
        advance(std::time::Duration::from_secs(4 * 60)).await;
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Warning);

        // Expiry fires at +5min
        advance(std::time::Duration::from_secs(60)).await;
        settle().await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Expired);
        assert_eq!(snapshot.notice, Some(SessionNotice::Expired));
        assert!(snapshot.user.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_clears_all_persisted_keys() {
        let handle = spawn_with(false);
        handle
            .login(test_user(), Utc::now() + ChronoDuration::minutes(5))
            .await
            .unwrap();
        handle
            .store_artifacts("tok".into(), "blob".into())
            .await
            .unwrap();
        settle().await;
        assert_eq!(handle.read_key(KEY_JWT_TOKEN).await.unwrap(), Some("tok".into()));

        advance(std::time::Duration::from_secs(5 * 60)).await;
        settle().await;

        for key in [KEY_USER, KEY_SESSION_EXPIRY, KEY_JWT_TOKEN, KEY_ENCRYPTED_PAYLOAD] {
            assert_eq!(handle.read_key(key).await.unwrap(), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_inside_warning_window_warns_immediately() {
        let handle = spawn_with(false);
        handle
            .login(test_user(), Utc::now() + ChronoDuration::seconds(30))
            .await
            .unwrap();
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_reschedules_timer_set() {
        let handle = spawn_with(false);
        handle
            .login(test_user(), Utc::now() + ChronoDuration::minutes(5))
            .await
            .unwrap();
        settle().await;

        // Enter the warning window at +4min30s
        advance(std::time::Duration::from_secs(4 * 60 + 30)).await;
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Warning);

        // Refresh extends by 5 minutes and clears the warning
        let new_expiry = handle.refresh().await.unwrap();
        settle().await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.expires_at, Some(new_expiry));
        assert!(snapshot.notice.is_none());

        // The old expiry deadline (30s away before refresh) must not fire
        advance(std::time::Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Active);

        // New warning at new_expiry - 60s; the clock has already moved ~60s
        advance(std::time::Duration::from_secs(3 * 60)).await;
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Warning);

        // And the new expiry lands 60s after the new warning
        advance(std::time::Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_expires_with_distinct_notice() {
        let handle = spawn_with(true);
        handle
            .login(test_user(), Utc::now() + ChronoDuration::minutes(5))
            .await
            .unwrap();
        settle().await;

        let result = handle.refresh().await;
        assert!(result.is_err());
        settle().await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Expired);
        assert_eq!(snapshot.notice, Some(SessionNotice::RefreshFailed));
        assert_eq!(handle.read_key(KEY_USER).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_clears_without_expired_notice() {
        let handle = spawn_with(false);
        handle
            .login(test_user(), Utc::now() + ChronoDuration::minutes(5))
            .await
            .unwrap();
        settle().await;

        handle.logout().await.unwrap();
        settle().await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::LoggedOut);
        assert!(snapshot.notice.is_none());
        assert_eq!(handle.read_key(KEY_USER).await.unwrap(), None);

        // No stale timer may fire after logout
        advance(std::time::Duration::from_secs(10 * 60)).await;
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::LoggedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_refresh_response_cannot_revive_expired_session() {
        // Session runs out at +90s; the refresh grant only comes back at
        // +120s. The stale grant must be dropped, not applied.
        let handle = SessionController::spawn(Arc::new(SlowRefresher {
            delay: std::time::Duration::from_secs(120),
            extend_by: ChronoDuration::minutes(5),
        }));
        handle
            .login(test_user(), Utc::now() + ChronoDuration::seconds(90))
            .await
            .unwrap();
        settle().await;

        let result = handle.refresh().await;
        assert!(matches!(result, Err(PorticoError::Unauthorized(_))));
        settle().await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Expired);
        assert_eq!(snapshot.notice, Some(SessionNotice::Expired));
        assert!(snapshot.user.is_none());
        for key in [KEY_USER, KEY_SESSION_EXPIRY, KEY_JWT_TOKEN, KEY_ENCRYPTED_PAYLOAD] {
            assert_eq!(handle.read_key(key).await.unwrap(), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_session_is_rejected() {
        let handle = spawn_with(false);
        let result = handle.refresh().await;
        assert!(matches!(result, Err(PorticoError::Unauthorized(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relogin_replaces_previous_timer_set() {
        let handle = spawn_with(false);
        handle
            .login(test_user(), Utc::now() + ChronoDuration::seconds(90))
            .await
            .unwrap();
        settle().await;

        // Second login with a longer window replaces the first set
        handle
            .login(test_user(), Utc::now() + ChronoDuration::minutes(10))
            .await
            .unwrap();
        settle().await;

        // The first session's expiry (+90s) must not fire
        advance(std::time::Duration::from_secs(2 * 60)).await;
        settle().await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Active);
    }
}
