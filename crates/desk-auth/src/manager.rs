//! Process-wide session manager.
//!
//! Owns the `Session` value exclusively. Consumers read it through a
//! watch channel and never write it; their lifecycles (sockets, poll
//! loops) hang off the scope token, which is cancelled synchronously
//! with every authenticated -> unauthenticated transition.

use crate::api::{SessionApi, SessionConfig};
use crate::error::AuthResult;
use desk_core::{Credentials, Session, UserIdentity};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Inner<A> {
    api: A,
    refresh_interval: Duration,
    session_tx: watch::Sender<Session>,
    /// Scope for session-gated components. Replaced on every
    /// unauthenticated transition so the next sign-in gets a fresh one.
    scope: Mutex<CancellationToken>,
    /// Process teardown signal for the refresh loop.
    shutdown: CancellationToken,
}

/// Authentication session manager.
///
/// Cheap to clone; all clones share the same session.
pub struct AuthSessionManager<A: SessionApi> {
    inner: Arc<Inner<A>>,
}

impl<A: SessionApi> Clone for AuthSessionManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: SessionApi> AuthSessionManager<A> {
    /// Create a manager in the unauthenticated startup state.
    pub fn new(api: A, config: &SessionConfig) -> Self {
        let (session_tx, _) = watch::channel(Session::unauthenticated());
        Self {
            inner: Arc::new(Inner {
                api,
                refresh_interval: Duration::from_millis(config.refresh_interval_ms),
                session_tx,
                scope: Mutex::new(CancellationToken::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Current session value.
    pub fn session(&self) -> Session {
        self.inner.session_tx.borrow().clone()
    }

    /// Whether the session is currently authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.inner.session_tx.borrow().authenticated
    }

    /// Subscribe to session transitions.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session_tx.subscribe()
    }

    /// Mint a token for a session-gated component.
    ///
    /// The token is cancelled the moment the session transitions to
    /// unauthenticated, tearing the component down synchronously.
    pub fn scope_token(&self) -> CancellationToken {
        self.inner.scope.lock().child_token()
    }

    /// Validate the ambient credential once.
    ///
    /// Run at startup and awaited before dependent components start.
    /// Any failure (transport or non-2xx) authoritatively means
    /// unauthenticated.
    pub async fn check_session(&self) -> Session {
        match self.inner.api.session_info().await {
            Ok(identity) => self.transition_authenticated(Some(identity)),
            Err(e) => {
                debug!(error = %e, "session check failed");
                self.transition_unauthenticated()
            }
        }
    }

    /// Submit credentials.
    ///
    /// On success the session becomes authenticated; the profile comes
    /// from the response when carried, otherwise from the next check.
    /// A rejection propagates so the caller can surface it.
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<Session> {
        let identity = self.inner.api.login(credentials).await?;
        Ok(self.transition_authenticated(identity))
    }

    /// Sign out.
    ///
    /// The server call is best-effort: local state is cleared no matter
    /// what, so the client never stays stuck looking signed in over a
    /// dead session.
    pub async fn logout(&self) -> Session {
        if let Err(e) = self.inner.api.logout().await {
            warn!(error = %e, "logout request failed, clearing local session anyway");
        }
        self.transition_unauthenticated()
    }

    /// Periodic credential refresh. Runs until `shutdown`.
    ///
    /// A failed refresh transitions to unauthenticated; there is no
    /// immediate retry, the next scheduled tick is the retry.
    pub async fn run_refresh_loop(&self) {
        let mut interval = tokio::time::interval(self.inner.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; the
        // first refresh belongs one full period after startup.
        interval.tick().await;

        loop {
            tokio::select! {
                () = self.inner.shutdown.cancelled() => {
                    info!("refresh loop stopped");
                    return;
                }
                _ = interval.tick() => {
                    match self.inner.api.refresh_session().await {
                        Ok(()) => {
                            debug!("session refreshed");
                            self.touch_authenticated();
                        }
                        Err(e) => {
                            warn!(error = %e, "session refresh failed");
                            self.transition_unauthenticated();
                        }
                    }
                }
            }
        }
    }

    /// Spawn the refresh loop on the runtime.
    pub fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move { manager.run_refresh_loop().await })
    }

    /// Tear the manager down: stops the refresh loop and cancels every
    /// session-scoped component. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.scope.lock().cancel();
    }

    fn transition_authenticated(&self, user: Option<UserIdentity>) -> Session {
        // A transition without a profile keeps the one already known.
        let user = user.or_else(|| self.inner.session_tx.borrow().user.clone());
        let next = Session::authenticated(user);
        self.inner.session_tx.send_replace(next.clone());
        info!(
            user = next.user.as_ref().map(|u| u.username.as_str()),
            "session authenticated"
        );
        next
    }

    fn transition_unauthenticated(&self) -> Session {
        // Dependents die with the transition, not after it: cancel the
        // scope before publishing the new state, then re-arm it for the
        // next sign-in.
        {
            let mut scope = self.inner.scope.lock();
            scope.cancel();
            *scope = CancellationToken::new();
        }

        let next = Session::unauthenticated();
        let was_authenticated = self
            .inner
            .session_tx
            .send_replace(next.clone())
            .authenticated;
        if was_authenticated {
            info!("session unauthenticated, dependents torn down");
        }
        next
    }

    /// Bump the check stamp after a successful refresh.
    fn touch_authenticated(&self) {
        self.inner.session_tx.send_if_modified(|session| {
            if session.authenticated {
                session.last_checked_at = chrono::Utc::now();
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Scripted session API: pops one pre-programmed result per call.
    #[derive(Default)]
    struct ScriptedApi {
        info: Mutex<VecDeque<AuthResult<UserIdentity>>>,
        refresh: Mutex<VecDeque<AuthResult<()>>>,
        login: Mutex<VecDeque<AuthResult<Option<UserIdentity>>>>,
        logout: Mutex<VecDeque<AuthResult<()>>>,
    }

    fn transport_err() -> AuthError {
        AuthError::HttpClient("connection refused".to_string())
    }

    fn identity(id: &str) -> UserIdentity {
        UserIdentity {
            id: id.to_string(),
            username: format!("user-{id}"),
            email: None,
        }
    }

    #[async_trait]
    impl SessionApi for Arc<ScriptedApi> {
        async fn session_info(&self) -> AuthResult<UserIdentity> {
            self.info.lock().pop_front().unwrap_or(Err(transport_err()))
        }

        async fn refresh_session(&self) -> AuthResult<()> {
            self.refresh
                .lock()
                .pop_front()
                .unwrap_or(Err(transport_err()))
        }

        async fn login(&self, _credentials: &Credentials) -> AuthResult<Option<UserIdentity>> {
            self.login
                .lock()
                .pop_front()
                .unwrap_or(Err(transport_err()))
        }

        async fn logout(&self) -> AuthResult<()> {
            self.logout
                .lock()
                .pop_front()
                .unwrap_or(Err(transport_err()))
        }
    }

    fn manager_with(api: Arc<ScriptedApi>, refresh_interval_ms: u64) -> AuthSessionManager<Arc<ScriptedApi>> {
        let mut config = SessionConfig::new("http://localhost:8000");
        config.refresh_interval_ms = refresh_interval_ms;
        AuthSessionManager::new(api, &config)
    }

    #[tokio::test]
    async fn test_check_session_failure_is_unauthenticated() {
        let api = Arc::new(ScriptedApi::default());
        let manager = manager_with(api, 60_000);

        // Every call fails at the transport; repeated checks stay
        // idempotently unauthenticated.
        for _ in 0..3 {
            let session = manager.check_session().await;
            assert!(!session.authenticated);
            assert!(session.user.is_none());
        }
    }

    #[tokio::test]
    async fn test_check_session_success_carries_identity() {
        let api = Arc::new(ScriptedApi::default());
        api.info.lock().push_back(Ok(identity("u-1")));
        let manager = manager_with(api, 60_000);

        let session = manager.check_session().await;
        assert!(session.authenticated);
        assert_eq!(session.user.unwrap().id, "u-1");
    }

    #[tokio::test]
    async fn test_logout_clears_state_even_when_endpoint_unreachable() {
        let api = Arc::new(ScriptedApi::default());
        api.info.lock().push_back(Ok(identity("u-1")));
        // logout queue left empty: every call errors.
        let manager = manager_with(api, 60_000);

        manager.check_session().await;
        assert!(manager.is_authenticated());

        let session = manager.logout().await;
        assert!(!session.authenticated);
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_without_profile_authenticates_then_check_populates() {
        let api = Arc::new(ScriptedApi::default());
        api.login.lock().push_back(Ok(None));
        api.info.lock().push_back(Ok(identity("u-7")));
        let manager = manager_with(api, 60_000);

        let session = manager
            .login(&Credentials::new("trader", "hunter2"))
            .await
            .unwrap();
        assert!(session.authenticated);
        assert!(session.user.is_none());

        let session = manager.check_session().await;
        assert_eq!(session.user.unwrap().id, "u-7");
    }

    #[tokio::test]
    async fn test_login_rejection_propagates_and_stays_unauthenticated() {
        let api = Arc::new(ScriptedApi::default());
        api.login
            .lock()
            .push_back(Err(AuthError::Rejected { status: 401 }));
        let manager = manager_with(api, 60_000);

        let result = manager.login(&Credentials::new("trader", "wrong")).await;
        assert!(result.is_err());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_unauthenticated_transition_cancels_scope() {
        let api = Arc::new(ScriptedApi::default());
        api.info.lock().push_back(Ok(identity("u-1")));
        let manager = manager_with(api, 60_000);

        manager.check_session().await;
        let scope = manager.scope_token();
        assert!(!scope.is_cancelled());

        manager.logout().await;
        assert!(scope.is_cancelled());

        // The next sign-in gets a fresh, uncancelled scope.
        assert!(!manager.scope_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_refresh_failure_transitions_to_unauthenticated() {
        let api = Arc::new(ScriptedApi::default());
        api.info.lock().push_back(Ok(identity("u-1")));
        api.refresh.lock().push_back(Ok(()));
        api.refresh
            .lock()
            .push_back(Err(AuthError::Rejected { status: 401 }));
        let manager = manager_with(api, 20);

        manager.check_session().await;
        let scope = manager.scope_token();
        let loop_handle = manager.spawn_refresh_loop();

        // First tick refreshes fine, second one is rejected.
        let mut session_rx = manager.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                session_rx.changed().await.unwrap();
                if !session_rx.borrow().authenticated {
                    break;
                }
            }
        })
        .await
        .expect("refresh failure never transitioned the session");

        assert!(scope.is_cancelled());
        assert!(!manager.is_authenticated());

        manager.shutdown();
        let _ = loop_handle.await;
    }

    #[tokio::test]
    async fn test_watch_subscribers_see_transitions() {
        let api = Arc::new(ScriptedApi::default());
        api.info.lock().push_back(Ok(identity("u-1")));
        let manager = manager_with(api, 60_000);
        let mut session_rx = manager.subscribe();

        manager.check_session().await;
        session_rx.changed().await.unwrap();
        assert!(session_rx.borrow().authenticated);

        manager.logout().await;
        session_rx.changed().await.unwrap();
        assert!(!session_rx.borrow().authenticated);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let api = Arc::new(ScriptedApi::default());
        let manager = manager_with(api, 60_000);
        manager.shutdown();
        manager.shutdown();
    }
}
