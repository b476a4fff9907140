use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{Identity, Profile};
use crate::providers::IdentityProvider;
use crate::services::{NewUser, UserService};

/// The registration form as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub agree_to_terms: bool,
}

impl SignupForm {
    /// Local checks that must pass before anything is sent to the provider.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.password != self.confirm_password {
            return Err(AppError::validation("Passwords do not match"));
        }
        if !self.agree_to_terms {
            return Err(AppError::validation(
                "You must agree to the Terms of Service and Privacy Policy",
            ));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn username(&self) -> String {
        self.email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Result of a successful registration. `profile` is absent when the users row
/// could not be created; the account itself still exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub identity: Identity,
    pub profile: Option<Profile>,
}

/// Login, registration and recovery calls against the identity provider, with
/// their follow-up writes to the users table.
pub struct AuthGateway {
    provider: Arc<dyn IdentityProvider>,
    users: UserService,
    app: AppConfig,
    metrics: Metrics,
}

impl AuthGateway {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: UserService,
        app: AppConfig,
        metrics: Metrics,
    ) -> Self {
        AuthGateway {
            provider,
            users,
            app,
            metrics,
        }
    }

    fn observe<T>(&self, operation: &str, result: Result<T, AppError>) -> Result<T, AppError> {
        match &result {
            Ok(_) => {
                self.metrics.record_auth_operation(operation, "success");
                info!(
                    event_name = %format!("auth.{}.succeeded", operation),
                    event_domain = "roomboard",
                    provider = self.provider.get_name(),
                    "Auth operation '{}' succeeded",
                    operation
                );
            }
            Err(e) => {
                self.metrics.record_auth_operation(operation, e.kind());
                warn!(
                    event_name = %format!("auth.{}.failed", operation),
                    event_domain = "roomboard",
                    provider = self.provider.get_name(),
                    error_kind = e.kind(),
                    error = %e,
                    "Auth operation '{}' failed",
                    operation
                );
            }
        }
        result
    }

    /// Validates locally, signs up, then creates the users row and default role.
    pub async fn register(&self, form: &SignupForm) -> Result<Registration, AppError> {
        if let Err(e) = form.validate() {
            return self.observe("register", Err(e));
        }

        let mut attributes = Map::new();
        attributes.insert("full_name".to_string(), Value::from(form.full_name()));
        attributes.insert("username".to_string(), Value::from(form.username()));

        let signed_up = self
            .provider
            .sign_up(&form.email, &form.password, attributes)
            .await;
        let identity = self.observe("register", signed_up)?;

        let new_user = NewUser {
            auth_id: identity.id.clone(),
            username: identity
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
            email: identity.email.clone(),
            full_name: form.full_name(),
        };
        let profile = match self.users.create_user(&new_user).await {
            Ok(profile) => {
                if let Err(e) = self
                    .users
                    .set_user_role(&profile.user_id, &self.app.default_role)
                    .await
                {
                    warn!(
                        user_id = profile.user_id.as_str(),
                        role = self.app.default_role.as_str(),
                        error = %e,
                        "Could not assign default role"
                    );
                }
                Some(profile)
            }
            Err(e) => {
                warn!(auth_id = identity.id.as_str(), error = %e, "Could not create users row");
                None
            }
        };

        Ok(Registration { identity, profile })
    }

    /// Signs in and stamps `last_login` on the profile.
    pub async fn login(&self, form: &LoginForm) -> Result<Identity, AppError> {
        let signed_in = self
            .provider
            .sign_in_with_password(&form.email, &form.password)
            .await;
        let identity = self.observe("login", signed_in)?;

        if let Err(e) = self.users.update_last_login(&identity.id).await {
            warn!(auth_id = identity.id.as_str(), error = %e, "Could not update last login");
        }
        Ok(identity)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let email = email.trim();
        if email.is_empty() {
            return self.observe(
                "forgot_password",
                Err(AppError::validation("Please enter your email address first")),
            );
        }
        let result = self
            .provider
            .reset_password_for_email(email, &self.app.reset_password_url())
            .await;
        self.observe("forgot_password", result)
    }

    /// Returns the URL to send the browser to for the configured OAuth provider.
    pub async fn sign_in_with_oauth(&self) -> Result<String, AppError> {
        let result = self
            .provider
            .sign_in_with_oauth(&self.app.oauth_provider, &self.app.oauth_callback_url())
            .await;
        self.observe("oauth", result)
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        let result = self.provider.sign_out().await;
        self.observe("logout", result)
    }
}
