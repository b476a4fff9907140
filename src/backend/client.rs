use std::sync::{PoisonError, RwLock};

use http::{Method, StatusCode};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::SupabaseConfig;
use crate::error::AppError;
use crate::models::AuthSession;

/// Shared HTTP plumbing for the Supabase REST surfaces.
///
/// Holds the current auth session so the relational and file stores send the
/// signed-in user's access token instead of the anon key.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self::with_base_url(&config.url, &config.anon_key)
    }

    pub fn with_base_url(base_url: &str, anon_key: &str) -> Self {
        SupabaseClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Starts a request with the `apikey` and `Authorization` headers set.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = url.as_str(), "Sending backend request");
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer_token())
    }

    /// Like [`request`](Self::request) but authorized with an explicit token.
    pub fn request_with_token(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    pub fn bearer_token(&self) -> String {
        self.session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone())
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

/// Returns the response unchanged when successful, otherwise the normalized error.
pub async fn check_response(response: Response) -> Result<Response, AppError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

/// Reads a successful response body as JSON.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Converts a non-2xx backend response into an `AppError`.
pub async fn error_from_response(response: Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_from_body(status, &body)
}

/// Normalizes the error payloads of the auth, rest and storage APIs.
///
/// Auth errors use `msg`/`error_description`, PostgREST uses `message` + `code`,
/// storage uses `error` + `statusCode`.
pub fn error_from_body(status: StatusCode, body: &str) -> AppError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Unexpected status code: {}", status));
    let code = parsed
        .get("code")
        .or_else(|| parsed.get("error_code"))
        .map(|c| match c {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();

    debug!(status = status.as_u16(), code = code.as_str(), "Backend returned an error");

    match code.as_str() {
        "PGRST116" => AppError::NotFound(message),
        "23505" | "23503" => AppError::Conflict(message),
        _ => match status {
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::CONFLICT => AppError::Conflict(message),
            _ => AppError::Provider(message),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    #[test]
    fn maps_postgrest_codes() {
        let not_found = error_from_body(
            StatusCode::NOT_ACCEPTABLE,
            r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#,
        );
        assert!(matches!(not_found, AppError::NotFound(_)));

        let conflict = error_from_body(
            StatusCode::CONFLICT,
            r#"{"code":"23503","message":"violates foreign key constraint"}"#,
        );
        assert_eq!(
            conflict,
            AppError::Conflict("violates foreign key constraint".to_string())
        );
    }

    #[test]
    fn maps_auth_messages() {
        let err = error_from_body(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        // `message`/`msg` are absent, `error_description` wins over `error` by order.
        assert_eq!(
            err,
            AppError::Provider("Invalid login credentials".to_string())
        );

        let err = error_from_body(StatusCode::UNPROCESSABLE_ENTITY, r#"{"code":422,"msg":"User already registered"}"#);
        assert_eq!(err, AppError::Provider("User already registered".to_string()));
    }

    #[test]
    fn falls_back_to_status_code() {
        let err = error_from_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(
            err,
            AppError::Provider("Unexpected status code: 502 Bad Gateway".to_string())
        );
        let err = error_from_body(StatusCode::NOT_FOUND, "");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn bearer_prefers_session_token() {
        let client = SupabaseClient::with_base_url("http://localhost:54321/", "anon");
        assert_eq!(client.base_url(), "http://localhost:54321");
        assert_eq!(client.bearer_token(), "anon");

        client.set_session(Some(AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: None,
            expires_in: None,
            expires_at: None,
            user: Identity::new("u1", "a@b.com"),
        }));
        assert_eq!(client.bearer_token(), "access");

        client.set_session(None);
        assert_eq!(client.bearer_token(), "anon");
    }
}
