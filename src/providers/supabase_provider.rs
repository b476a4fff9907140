use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use reqwest::Url;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::base::{AuthEvent, AuthEvents, AuthStateChange, IdentityProvider};
use crate::backend::client::{check_response, read_json, SupabaseClient};
use crate::error::AppError;
use crate::models::{AuthSession, Identity};

/// Identity provider backed by the Supabase auth (GoTrue) REST API.
pub struct SupabaseProvider {
    client: Arc<SupabaseClient>,
    events: AuthEvents,
}

impl SupabaseProvider {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        info!(
            "Creating Supabase identity provider for '{}'",
            client.base_url()
        );
        Self {
            client,
            events: AuthEvents::new(),
        }
    }

    async fn token_request(&self, grant_type: &str, body: Value) -> Result<AuthSession, AppError> {
        let path = format!("/auth/v1/token?grant_type={}", grant_type);
        let response = self
            .client
            .request(Method::POST, &path)
            .json(&body)
            .send()
            .await?;
        let session: AuthSession = read_json(check_response(response).await?).await?;
        Ok(session.normalized())
    }

    /// Stores the session for subsequent requests and announces it.
    fn store_session(&self, session: AuthSession, event: AuthEvent) -> Identity {
        let identity = session.user.clone();
        self.client.set_session(Some(session));
        self.events.emit(event, Some(identity.clone()));
        identity
    }
}

#[async_trait]
impl IdentityProvider for SupabaseProvider {
    fn get_name(&self) -> &str {
        "supabase-auth"
    }

    fn get_type(&self) -> &str {
        "supabase"
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: Map<String, Value>,
    ) -> Result<Identity, AppError> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/signup")
            .json(&json!({ "email": email, "password": password, "data": attributes }))
            .send()
            .await?;
        let body: Value = read_json(check_response(response).await?).await?;

        // With auto-confirm the project answers with a full session, otherwise
        // with the bare (unconfirmed) user.
        if body.get("access_token").is_some() {
            let session: AuthSession = serde_json::from_value(body)?;
            return Ok(self.store_session(session.normalized(), AuthEvent::SignedIn));
        }
        let user = match body.get("user") {
            Some(user) if user.is_object() => user.clone(),
            _ => body,
        };
        let identity: Identity = serde_json::from_value(user)?;
        debug!(user_id = identity.id.as_str(), "Sign-up awaiting email confirmation");
        Ok(identity)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AppError> {
        let session = self
            .token_request("password", json!({ "email": email, "password": password }))
            .await?;
        Ok(self.store_session(session, AuthEvent::SignedIn))
    }

    async fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: &str,
    ) -> Result<String, AppError> {
        let url = Url::parse_with_params(
            &self.client.url("/auth/v1/authorize"),
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .map_err(|e| AppError::provider(format!("Invalid authorize URL: {}", e)))?;
        Ok(url.to_string())
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let result = match self.client.session() {
            Some(session) => {
                let response = self
                    .client
                    .request_with_token(Method::POST, "/auth/v1/logout", &session.access_token)
                    .send()
                    .await;
                match response {
                    Ok(r) => check_response(r).await.map(|_| ()),
                    Err(e) => Err(e.into()),
                }
            }
            None => Ok(()),
        };

        // The local session is gone regardless of what the server said.
        self.client.set_session(None);
        self.events.emit(AuthEvent::SignedOut, None);

        if let Err(e) = &result {
            warn!("Remote sign-out failed: {}", e);
        }
        result
    }

    async fn get_current_user(&self) -> Result<Option<Identity>, AppError> {
        let Some(mut session) = self.client.session() else {
            debug!("No stored session; nobody is signed in");
            return Ok(None);
        };

        if session.is_expired() {
            debug!("Stored session expired; refreshing");
            self.refresh_session().await?;
            match self.client.session() {
                Some(refreshed) => session = refreshed,
                None => return Ok(None),
            }
        }

        let response = self
            .client
            .request_with_token(Method::GET, "/auth/v1/user", &session.access_token)
            .send()
            .await?;
        let identity: Identity = read_json(check_response(response).await?).await?;
        session.user = identity.clone();
        self.client.set_session(Some(session));
        Ok(Some(identity))
    }

    fn get_session(&self) -> Option<AuthSession> {
        self.client.session()
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AppError> {
        let response = self
            .client
            .request(Method::POST, "/auth/v1/recover")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }

    async fn update_user(&self, email: &str) -> Result<Identity, AppError> {
        let Some(mut session) = self.client.session() else {
            return Err(AppError::provider("Auth session missing!"));
        };
        let response = self
            .client
            .request_with_token(Method::PUT, "/auth/v1/user", &session.access_token)
            .json(&json!({ "email": email }))
            .send()
            .await?;
        let identity: Identity = read_json(check_response(response).await?).await?;
        session.user = identity.clone();
        self.client.set_session(Some(session));
        self.events.emit(AuthEvent::UserUpdated, Some(identity.clone()));
        Ok(identity)
    }

    async fn refresh_session(&self) -> Result<Identity, AppError> {
        let Some(current) = self.client.session() else {
            return Err(AppError::provider("Auth session missing!"));
        };
        let session = self
            .token_request(
                "refresh_token",
                json!({ "refresh_token": current.refresh_token }),
            )
            .await?;
        Ok(self.store_session(session, AuthEvent::TokenRefreshed))
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}
