use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::base::{AuthEvent, AuthEvents, AuthStateChange, IdentityProvider};
use crate::error::AppError;
use crate::models::{AuthSession, Identity};

/// Lifetime of sessions issued by the plain provider.
const SESSION_TTL_SECS: i64 = 3600;

/// Represents a single configured account (email + password).
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct PlainUserEntry {
    pub email: String,
    pub password: String,
    /// Fixed identity id; a random UUID is assigned when omitted.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Clone)]
struct Account {
    identity: Identity,
    password: String,
}

/// An in-process identity provider that checks credentials against a
/// configured account list. Sign-ups are kept for the life of the process.
pub struct PlainProvider {
    accounts: RwLock<Vec<Account>>,
    session: RwLock<Option<AuthSession>>,
    events: AuthEvents,
}

impl PlainProvider {
    pub fn new(users: &[PlainUserEntry]) -> Self {
        info!("Creating plain identity provider with {} users", users.len());
        let accounts = users
            .iter()
            .map(|entry| Account {
                identity: Identity::new(
                    entry
                        .id
                        .clone()
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    entry.email.clone(),
                )
                .with_metadata(entry.metadata.clone()),
                password: entry.password.clone(),
            })
            .collect();
        Self {
            accounts: RwLock::new(accounts),
            session: RwLock::new(None),
            events: AuthEvents::new(),
        }
    }

    fn issue_session(identity: Identity) -> AuthSession {
        AuthSession {
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: uuid::Uuid::new_v4().to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: Some(SESSION_TTL_SECS),
            expires_at: Some(Utc::now().timestamp() + SESSION_TTL_SECS),
            user: identity,
        }
    }

    fn current(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_session(&self, session: Option<AuthSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn find_by_email(&self, email: &str) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| a.identity.email.eq_ignore_ascii_case(email))
            .cloned()
    }
}

#[async_trait]
impl IdentityProvider for PlainProvider {
    fn get_name(&self) -> &str {
        "plain"
    }

    fn get_type(&self) -> &str {
        "plain"
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: Map<String, Value>,
    ) -> Result<Identity, AppError> {
        if email.trim().is_empty() {
            return Err(AppError::validation("Email is required"));
        }
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if accounts
            .iter()
            .any(|a| a.identity.email.eq_ignore_ascii_case(email))
        {
            return Err(AppError::conflict("User already registered"));
        }
        let identity =
            Identity::new(uuid::Uuid::new_v4().to_string(), email).with_metadata(attributes);
        accounts.push(Account {
            identity: identity.clone(),
            password: password.to_string(),
        });
        debug!(user_id = identity.id.as_str(), "Registered plain account");
        Ok(identity)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError> {
        match self.find_by_email(email) {
            Some(account) if account.password == password => {
                let identity = account.identity;
                self.replace_session(Some(Self::issue_session(identity.clone())));
                self.events.emit(AuthEvent::SignedIn, Some(identity.clone()));
                Ok(identity)
            }
            _ => Err(AppError::provider("Invalid login credentials")),
        }
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        _redirect_to: &str,
    ) -> Result<String, AppError> {
        Err(AppError::provider(format!(
            "OAuth provider '{}' is not supported by the plain provider",
            provider
        )))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.replace_session(None);
        self.events.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn get_current_user(&self) -> Result<Option<Identity>, AppError> {
        match self.current() {
            Some(session) if session.is_expired() => self.refresh_session().await.map(Some),
            Some(session) => Ok(Some(session.user)),
            None => Ok(None),
        }
    }

    fn get_session(&self) -> Option<AuthSession> {
        self.current()
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AppError> {
        // Never reveal whether the address is registered.
        debug!(
            known = self.find_by_email(email).is_some(),
            redirect_to, "Password reset requested"
        );
        Ok(())
    }

    async fn update_user(&self, email: &str) -> Result<Identity, AppError> {
        let Some(mut session) = self.current() else {
            return Err(AppError::provider("Auth session missing!"));
        };
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if accounts.iter().any(|a| {
            a.identity.id != session.user.id && a.identity.email.eq_ignore_ascii_case(email)
        }) {
            return Err(AppError::conflict(
                "A user with this email address has already been registered",
            ));
        }
        let account = accounts
            .iter_mut()
            .find(|a| a.identity.id == session.user.id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        account.identity.email = email.to_string();
        let identity = account.identity.clone();
        drop(accounts);

        session.user = identity.clone();
        self.replace_session(Some(session));
        self.events.emit(AuthEvent::UserUpdated, Some(identity.clone()));
        Ok(identity)
    }

    async fn refresh_session(&self) -> Result<Identity, AppError> {
        let Some(current) = self.current() else {
            return Err(AppError::provider("Auth session missing!"));
        };
        let identity = current.user;
        self.replace_session(Some(Self::issue_session(identity.clone())));
        self.events.emit(AuthEvent::TokenRefreshed, Some(identity.clone()));
        Ok(identity)
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}
