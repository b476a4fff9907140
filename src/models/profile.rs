use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Application-level user record from the `users` table.
///
/// Keyed by the internal `user_id`; `auth_id` links it to the provider identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub auth_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub last_login: Option<String>,
}

/// The editable subset of a profile, pre-filled from the cached copy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    pub full_name: String,
}

impl From<&Profile> for ProfileForm {
    fn from(profile: &Profile) -> Self {
        ProfileForm {
            username: profile.username.clone().unwrap_or_default(),
            email: profile.email.clone().unwrap_or_default(),
            full_name: profile.full_name.clone().unwrap_or_default(),
        }
    }
}

/// Per-user dashboard preferences.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct UserSettings {
    pub notifications: bool,
    pub dark_mode: bool,
    pub two_factor_auth: bool,
    pub language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        UserSettings {
            notifications: true,
            dark_mode: false,
            two_factor_auth: false,
            language: "English".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_prefill_treats_nulls_as_empty() {
        let profile: Profile = serde_json::from_value(json!({
            "user_id": "p1",
            "auth_id": "u1",
            "username": null,
            "email": "a@b.com",
            "full_name": null
        }))
        .unwrap();

        let form = ProfileForm::from(&profile);
        assert_eq!(form.username, "");
        assert_eq!(form.email, "a@b.com");
        assert_eq!(form.full_name, "");
    }

    #[test]
    fn default_settings_match_dashboard_defaults() {
        let settings = UserSettings::default();
        assert!(settings.notifications);
        assert!(!settings.dark_mode);
        assert!(!settings.two_factor_auth);
        assert_eq!(settings.language, "English");
    }
}
