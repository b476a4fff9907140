use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tokens are treated as expired this many seconds before their real expiry.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// The authenticated principal as known to the identity provider.
///
/// Replaced wholesale on every provider event; never patched in place.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: String,
    /// Raw provider metadata (`user_metadata` on the wire).
    #[serde(default, rename = "user_metadata")]
    pub metadata: Map<String, Value>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Identity {
            id: id.into(),
            email: email.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Convenience accessor for string metadata such as `full_name` or `username`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// A live session issued by the identity provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: Identity,
}

impl AuthSession {
    /// Fills in `expires_at` from `expires_in` when the provider only sent the latter.
    pub fn normalized(mut self) -> Self {
        if self.expires_at.is_none() {
            if let Some(expires_in) = self.expires_in {
                self.expires_at = Some(Utc::now().timestamp() + expires_in);
            }
        }
        self
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - EXPIRY_MARGIN_SECS <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_reads_user_metadata() {
        let identity: Identity = serde_json::from_value(json!({
            "id": "u1",
            "email": "a@b.com",
            "aud": "authenticated",
            "user_metadata": {"full_name": "Ada Lovelace", "username": "a"}
        }))
        .unwrap();

        assert_eq!(identity.id, "u1");
        assert_eq!(identity.email, "a@b.com");
        assert_eq!(identity.metadata_str("full_name"), Some("Ada Lovelace"));
        assert_eq!(identity.metadata_str("missing"), None);
    }

    #[test]
    fn identity_without_email_defaults_to_empty() {
        let identity: Identity = serde_json::from_value(json!({"id": "u2"})).unwrap();
        assert_eq!(identity.email, "");
        assert!(identity.metadata.is_empty());
    }

    #[test]
    fn session_expiry_uses_margin() {
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: None,
            expires_in: None,
            expires_at: Some(1_000),
            user: Identity::new("u1", "a@b.com"),
        };
        assert!(!session.is_expired_at(980));
        assert!(session.is_expired_at(995));
        assert!(session.is_expired_at(2_000));
    }

    #[test]
    fn normalized_derives_expires_at() {
        let session = AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
            expires_at: None,
            user: Identity::new("u1", "a@b.com"),
        }
        .normalized();
        let expires_at = session.expires_at.expect("expires_at should be set");
        assert!(expires_at > Utc::now().timestamp());
        assert!(!session.is_expired());
    }
}
