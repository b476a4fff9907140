//! The session store: who is signed in, and whether the first check has finished.
//!
//! A single writer owns [`SessionState`]. Dependents never touch it directly;
//! they hold a [`watch::Receiver`] obtained from [`SessionStore::watch`] and are
//! notified on every applied change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::guard::GuardState;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::Identity;
use crate::providers::{AuthEvent, AuthStateChange, IdentityProvider};
use crate::utils::log_throttle::should_emit;

const LAG_LOG_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub identity: Option<Identity>,
    /// True only until the initial existence check resolves.
    pub loading: bool,
}

impl SessionState {
    pub fn pending() -> Self {
        SessionState {
            identity: None,
            loading: true,
        }
    }

    pub fn resolved(identity: Option<Identity>) -> Self {
        SessionState {
            identity,
            loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn guard_state(&self) -> GuardState {
        GuardState::from_flags(self.loading, self.is_authenticated())
    }
}

/// State shared between the store and its event subscription task.
struct SessionCell {
    state: watch::Sender<SessionState>,
    /// Bumped by every applied event; lets an event win over a slower initial check.
    generation: AtomicU64,
    metrics: Metrics,
}

impl SessionCell {
    fn apply(&self, change: &AuthStateChange) -> bool {
        let identity = match change.event {
            AuthEvent::SignedIn | AuthEvent::TokenRefreshed => change.identity.clone(),
            AuthEvent::SignedOut => None,
            _ => {
                debug!(event = change.event.as_str(), "Ignoring auth event");
                self.metrics
                    .record_session_event(change.event.as_str(), false);
                return false;
            }
        };

        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            state.identity = identity;
        });
        self.metrics.record_session_event(change.event.as_str(), true);
        info!(
            event_name = "session.changed",
            event_domain = "roomboard",
            event = change.event.as_str(),
            authenticated = change.identity.is_some() && change.event != AuthEvent::SignedOut,
            "Session updated"
        );
        true
    }
}

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    cell: Arc<SessionCell>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>, metrics: Metrics) -> Self {
        let (state, _) = watch::channel(SessionState::pending());
        SessionStore {
            provider,
            cell: Arc::new(SessionCell {
                state,
                generation: AtomicU64::new(0),
                metrics,
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Runs the one-time existence check and clears `loading`.
    ///
    /// A provider error resolves to "not authenticated" and is only logged.
    pub async fn initialize(&self) -> SessionState {
        let started = self.cell.generation.load(Ordering::SeqCst);
        let identity = match self.provider.get_current_user().await {
            Ok(identity) => {
                let result = if identity.is_some() {
                    "authenticated"
                } else {
                    "unauthenticated"
                };
                self.cell.metrics.record_session_init(result);
                identity
            }
            Err(e) => {
                error!(
                    event_name = "session.check.failed",
                    event_domain = "roomboard",
                    provider = self.provider.get_name(),
                    error = %e,
                    "Error checking user session"
                );
                self.cell.metrics.record_session_init("failed");
                None
            }
        };

        let cell = &self.cell;
        cell.state.send_modify(|state| {
            if cell.generation.load(Ordering::SeqCst) == started {
                state.identity = identity;
            } else {
                debug!("Auth event arrived during the session check; keeping it");
            }
            state.loading = false;
        });
        self.snapshot()
    }

    /// Starts forwarding provider events into the store. Calling it again while
    /// subscribed does nothing.
    pub fn subscribe(&self) {
        let mut slot = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("Session store already subscribed");
            return;
        }

        let mut events = self.provider.on_auth_state_change();
        let cell = self.cell.clone();
        let provider = self.provider.get_name().to_string();
        *slot = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(change) => {
                        cell.apply(&change);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        if let Some(suppressed) = should_emit("session.events.lagged", LAG_LOG_WINDOW)
                        {
                            warn!(
                                event_name = "session.events.lagged",
                                event_domain = "roomboard",
                                skipped,
                                suppressed,
                                "Session store fell behind auth events"
                            );
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!(provider = provider.as_str(), "Auth event stream closed");
                        break;
                    }
                }
            }
        }));
        info!(provider = self.provider.get_name(), "Subscribed to auth events");
    }

    /// Applies one event directly. Returns whether the state changed.
    pub fn apply(&self, change: &AuthStateChange) -> bool {
        self.cell.apply(change)
    }

    /// Releases the event subscription. Safe to call more than once and never notifies.
    pub fn teardown(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Session subscription released");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn snapshot(&self) -> SessionState {
        self.cell.state.borrow().clone()
    }

    /// Read-only handle for dependents; changes arrive as notifications.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.cell.state.subscribe()
    }

    /// Waits until the initial check has resolved. There is no timeout.
    pub async fn resolved(&self) -> SessionState {
        let mut rx = self.watch();
        let state = match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        };
        state
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SupabaseClient;
    use crate::models::AuthSession;
    use crate::error::AppError;
    use crate::providers::plain_provider::PlainUserEntry;
    use crate::providers::{AuthEvents, PlainProvider, SupabaseProvider};
    use async_trait::async_trait;
    use chrono::Utc;
    use mockito::Server;
    use proptest::prelude::*;
    use serde_json::{Map, Value};
    use tokio::sync::Notify;
    use tokio::time::timeout;

    fn plain_provider() -> Arc<PlainProvider> {
        Arc::new(PlainProvider::new(&[PlainUserEntry {
            email: "a@b.com".to_string(),
            password: "secret".to_string(),
            id: Some("u1".to_string()),
            metadata: Default::default(),
        }]))
    }

    fn change(event: AuthEvent, identity: Option<Identity>) -> AuthStateChange {
        AuthStateChange::new(event, identity)
    }

    #[tokio::test]
    async fn initialize_without_session_resolves_to_denied() {
        let store = SessionStore::new(plain_provider(), Metrics::new());
        assert_eq!(store.snapshot(), SessionState::pending());

        let state = store.initialize().await;
        assert_eq!(state, SessionState::resolved(None));
        assert_eq!(state.guard_state(), GuardState::Denied);
    }

    #[tokio::test]
    async fn initialize_fails_open_on_provider_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/auth/v1/user")
            .with_status(500)
            .with_body(r#"{"msg":"boom"}"#)
            .create_async()
            .await;

        let client = Arc::new(SupabaseClient::with_base_url(&server.url(), "anon"));
        client.set_session(Some(AuthSession {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
            expires_at: Some(Utc::now().timestamp() + 3600),
            user: Identity::new("u1", "a@b.com"),
        }));
        let metrics = Metrics::new();
        let store = SessionStore::new(Arc::new(SupabaseProvider::new(client)), metrics.clone());

        let state = store.initialize().await;
        assert_eq!(state, SessionState::resolved(None));
        assert!(metrics
            .render()
            .contains("session_initializations_total{result=\"failed\"} 1"));
    }

    #[tokio::test]
    async fn signed_in_event_reaches_watchers() {
        let provider = plain_provider();
        let store = SessionStore::new(provider.clone(), Metrics::new());
        store.subscribe();
        store.initialize().await;
        let mut rx = store.watch();

        provider.sign_in_with_password("a@b.com", "secret").await.unwrap();

        let state = timeout(Duration::from_secs(2), rx.wait_for(|s| s.identity.is_some()))
            .await
            .expect("no notification")
            .unwrap()
            .clone();
        let identity = state.identity.unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.email, "a@b.com");
        assert!(!state.loading);

        store.teardown();
    }

    /// Holds `get_current_user` open until the test releases it.
    struct GatedProvider {
        entered: Notify,
        gate: Notify,
        events: AuthEvents,
    }

    #[async_trait]
    impl IdentityProvider for GatedProvider {
        fn get_name(&self) -> &str {
            "gated"
        }
        fn get_type(&self) -> &str {
            "test"
        }
        async fn sign_up(&self, _: &str, _: &str, _: Map<String, Value>) -> Result<Identity, AppError> {
            Err(AppError::provider("unsupported"))
        }
        async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<Identity, AppError> {
            Err(AppError::provider("unsupported"))
        }
        async fn sign_in_with_oauth(&self, _: &str, _: &str) -> Result<String, AppError> {
            Err(AppError::provider("unsupported"))
        }
        async fn sign_out(&self) -> Result<(), AppError> {
            Ok(())
        }
        async fn get_current_user(&self) -> Result<Option<Identity>, AppError> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(Some(Identity::new("stale", "stale@example.com")))
        }
        fn get_session(&self) -> Option<AuthSession> {
            None
        }
        async fn reset_password_for_email(&self, _: &str, _: &str) -> Result<(), AppError> {
            Ok(())
        }
        async fn update_user(&self, _: &str) -> Result<Identity, AppError> {
            Err(AppError::provider("unsupported"))
        }
        async fn refresh_session(&self) -> Result<Identity, AppError> {
            Err(AppError::provider("unsupported"))
        }
        fn on_auth_state_change(&self) -> tokio::sync::broadcast::Receiver<AuthStateChange> {
            self.events.subscribe()
        }
    }

    #[tokio::test]
    async fn event_during_initialize_wins() {
        let provider = Arc::new(GatedProvider {
            entered: Notify::new(),
            gate: Notify::new(),
            events: AuthEvents::new(),
        });
        let store = Arc::new(SessionStore::new(provider.clone(), Metrics::new()));

        let init = tokio::spawn({
            let store = store.clone();
            async move { store.initialize().await }
        });
        provider.entered.notified().await;
        store.apply(&change(AuthEvent::SignedIn, Some(Identity::new("u2", "c@d.com"))));
        provider.gate.notify_one();

        let state = init.await.unwrap();
        assert_eq!(state.identity.unwrap().id, "u2");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn resolved_waits_for_the_session_check() {
        let provider = Arc::new(GatedProvider {
            entered: Notify::new(),
            gate: Notify::new(),
            events: AuthEvents::new(),
        });
        let store = Arc::new(SessionStore::new(provider.clone(), Metrics::new()));

        let init = tokio::spawn({
            let store = store.clone();
            async move { store.initialize().await }
        });
        provider.entered.notified().await;

        let waiter = tokio::spawn({
            let store = store.clone();
            async move { store.resolved().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        assert!(store.snapshot().loading);

        provider.gate.notify_one();
        let state = timeout(Duration::from_secs(2), waiter)
            .await
            .expect("resolved() never returned")
            .unwrap();
        assert!(!state.loading);
        assert_eq!(state.identity.unwrap().id, "stale");
        init.await.unwrap();

        let again = timeout(Duration::from_secs(2), store.resolved())
            .await
            .expect("resolved() should return at once after the check");
        assert!(!again.loading);
    }

    #[tokio::test]
    async fn unrecognized_events_are_ignored() {
        let store = SessionStore::new(plain_provider(), Metrics::new());
        store.initialize().await;
        assert!(store.apply(&change(AuthEvent::SignedIn, Some(Identity::new("u1", "a@b.com")))));
        assert!(!store.apply(&change(AuthEvent::UserUpdated, None)));
        assert!(!store.apply(&change(AuthEvent::Other("MFA".into()), None)));
        assert_eq!(store.snapshot().identity.unwrap().id, "u1");

        assert!(store.apply(&change(AuthEvent::SignedOut, Some(Identity::new("u1", "a@b.com")))));
        assert!(store.snapshot().identity.is_none());
    }

    #[tokio::test]
    async fn teardown_twice_is_harmless_and_silent() {
        let store = SessionStore::new(plain_provider(), Metrics::new());
        store.subscribe();
        store.subscribe();
        assert!(store.is_subscribed());
        store.initialize().await;

        let mut rx = store.watch();
        let _ = rx.borrow_and_update();
        store.teardown();
        store.teardown();
        assert!(!store.is_subscribed());
        assert!(!rx.has_changed().unwrap());
    }

    #[derive(Debug, Clone)]
    enum Step {
        SignIn(u8),
        Refresh(u8),
        SignOut,
        Other,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            any::<u8>().prop_map(Step::SignIn),
            any::<u8>().prop_map(Step::Refresh),
            Just(Step::SignOut),
            Just(Step::Other),
        ]
    }

    fn identity(n: u8) -> Identity {
        Identity::new(format!("u{}", n), format!("u{}@example.com", n))
    }

    proptest! {
        #[test]
        fn identity_follows_last_recognized_event(steps in proptest::collection::vec(step(), 0..40)) {
            let store = SessionStore::new(plain_provider(), Metrics::new());
            let mut expected: Option<Identity> = None;
            for s in &steps {
                match s {
                    Step::SignIn(n) => {
                        store.apply(&change(AuthEvent::SignedIn, Some(identity(*n))));
                        expected = Some(identity(*n));
                    }
                    Step::Refresh(n) => {
                        store.apply(&change(AuthEvent::TokenRefreshed, Some(identity(*n))));
                        expected = Some(identity(*n));
                    }
                    Step::SignOut => {
                        store.apply(&change(AuthEvent::SignedOut, None));
                        expected = None;
                    }
                    Step::Other => {
                        store.apply(&change(AuthEvent::PasswordRecovery, Some(identity(0))));
                    }
                }
            }
            prop_assert_eq!(store.snapshot().identity, expected);
            prop_assert!(store.snapshot().loading);
        }
    }
}
