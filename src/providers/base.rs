use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::AppError;
use crate::models::{AuthSession, Identity};

/// Buffered auth events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 32;

/// Auth state change kinds emitted by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
    Other(String),
}

impl AuthEvent {
    pub fn as_str(&self) -> &str {
        match self {
            AuthEvent::InitialSession => "INITIAL_SESSION",
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated => "USER_UPDATED",
            AuthEvent::PasswordRecovery => "PASSWORD_RECOVERY",
            AuthEvent::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "INITIAL_SESSION" => AuthEvent::InitialSession,
            "SIGNED_IN" => AuthEvent::SignedIn,
            "SIGNED_OUT" => AuthEvent::SignedOut,
            "TOKEN_REFRESHED" => AuthEvent::TokenRefreshed,
            "USER_UPDATED" => AuthEvent::UserUpdated,
            "PASSWORD_RECOVERY" => AuthEvent::PasswordRecovery,
            other => AuthEvent::Other(other.to_string()),
        }
    }
}

/// One event from the provider, with the identity attached to it (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub identity: Option<Identity>,
}

impl AuthStateChange {
    pub fn new(event: AuthEvent, identity: Option<Identity>) -> Self {
        AuthStateChange { event, identity }
    }
}

/// Fan-out of auth state changes to every registered listener.
pub struct AuthEvents {
    sender: broadcast::Sender<AuthStateChange>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        AuthEvents { sender }
    }

    pub fn emit(&self, event: AuthEvent, identity: Option<Identity>) {
        let name = event.as_str().to_string();
        match self.sender.send(AuthStateChange::new(event, identity)) {
            Ok(listeners) => debug!(event = name.as_str(), listeners, "Auth event emitted"),
            Err(_) => debug!(event = name.as_str(), "Auth event emitted with no listeners"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.sender.subscribe()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// The remote identity provider. Every call normalizes into `Result<_, AppError>`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// A descriptive name for logs.
    fn get_name(&self) -> &str;

    /// The backend kind, e.g. "supabase" or "plain".
    fn get_type(&self) -> &str;

    /// Registers a new account. `attributes` become the identity's metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: Map<String, Value>,
    ) -> Result<Identity, AppError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Identity, AppError>;

    /// Returns the URL the browser must be sent to for the OAuth flow.
    async fn sign_in_with_oauth(&self, provider: &str, redirect_to: &str)
        -> Result<String, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    /// `Ok(None)` when nobody is signed in.
    async fn get_current_user(&self) -> Result<Option<Identity>, AppError>;

    fn get_session(&self) -> Option<AuthSession>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str)
        -> Result<(), AppError>;

    /// Changes the signed-in identity's email.
    async fn update_user(&self, email: &str) -> Result<Identity, AppError>;

    async fn refresh_session(&self) -> Result<Identity, AppError>;

    /// Registers a listener; dropping the receiver unregisters it.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange>;
}
