use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Profile, ProfileForm, Row, UserSettings};
use crate::store::base::{first_row, from_row};
use crate::store::{Query, RemoteStore};

const USERS: &str = "users";
const USER_ROLES: &str = "user_roles";
const USER_SERVICES: &str = "user_services";
const USER_SETTINGS: &str = "user_settings";

/// Fields of a `users` row created right after sign-up.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub auth_id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}

/// Profiles, roles, service selections and settings in the relational store.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RemoteStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        UserService { store }
    }

    /// Inserts the `users` row for a new identity under a freshly generated internal id.
    pub async fn create_user(&self, user: &NewUser) -> Result<Profile, AppError> {
        let row = object(json!({
            "user_id": Uuid::new_v4().to_string(),
            "auth_id": user.auth_id,
            "username": user.username,
            "email": user.email,
            "full_name": user.full_name,
            "is_active": true,
        }));
        let rows = self.store.insert(USERS, vec![row]).await?;
        from_row(first_row(rows, USERS)?)
    }

    /// Profile linked to a provider identity.
    pub async fn get_profile(&self, auth_id: &str) -> Result<Profile, AppError> {
        let row = self
            .store
            .select_one(&Query::table(USERS).eq("auth_id", auth_id))
            .await?;
        from_row(row)
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Profile, AppError> {
        let row = self
            .store
            .select_one(&Query::table(USERS).eq("user_id", user_id))
            .await?;
        from_row(row)
    }

    pub async fn update_last_login(&self, auth_id: &str) -> Result<(), AppError> {
        self.store
            .update(
                &Query::table(USERS).eq("auth_id", auth_id),
                object(json!({ "last_login": now_rfc3339() })),
            )
            .await?;
        Ok(())
    }

    /// Writes the editable profile fields and returns the stored profile.
    pub async fn update_profile(
        &self,
        auth_id: &str,
        form: &ProfileForm,
    ) -> Result<Profile, AppError> {
        let patch = object(json!({
            "username": form.username,
            "email": form.email,
            "full_name": form.full_name,
        }));
        let rows = self
            .store
            .update(&Query::table(USERS).eq("auth_id", auth_id), patch)
            .await?;
        from_row(first_row(rows, USERS)?)
    }

    pub async fn set_user_role(&self, user_id: &str, role_name: &str) -> Result<(), AppError> {
        let row = object(json!({ "user_id": user_id, "role_name": role_name }));
        self.store.insert(USER_ROLES, vec![row]).await?;
        Ok(())
    }

    /// Whether the user holds `role_name`. Lookup failures count as "no".
    pub async fn has_role(&self, user_id: &str, role_name: &str) -> bool {
        let query = Query::table(USER_ROLES)
            .eq("user_id", user_id)
            .eq("role_name", role_name)
            .limit(1);
        match self.store.select(&query).await {
            Ok(rows) => !rows.is_empty(),
            Err(AppError::NotFound(_)) => false,
            Err(e) => {
                warn!(
                    event_name = "roles.check.failed",
                    event_domain = "roomboard",
                    user_id,
                    role_name,
                    error = %e,
                    "Error checking role"
                );
                false
            }
        }
    }

    pub async fn save_service_selection(
        &self,
        user_id: &str,
        service_id: i64,
    ) -> Result<(), AppError> {
        let row = object(json!({
            "user_id": user_id,
            "service_id": service_id,
            "selected_at": now_rfc3339(),
        }));
        self.store.upsert(USER_SERVICES, vec![row], "user_id").await?;
        Ok(())
    }

    /// Most recent service selection with its embedded service, if any.
    pub async fn get_user_service(&self, user_id: &str) -> Result<Option<Row>, AppError> {
        let query = Query::table(USER_SERVICES)
            .select("*, services(*)")
            .eq("user_id", user_id)
            .order("selected_at", false)
            .limit(1);
        match self.store.select(&query).await {
            Ok(rows) => Ok(rows.into_iter().next()),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn save_settings(
        &self,
        user_id: &str,
        settings: &UserSettings,
    ) -> Result<UserSettings, AppError> {
        let row = object(json!({ "user_id": user_id, "settings": settings }));
        let rows = self.store.upsert(USER_SETTINGS, vec![row], "user_id").await?;
        let stored = first_row(rows, USER_SETTINGS)?;
        match stored.get("settings") {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(settings.clone()),
        }
    }

    /// Stored settings, or `None` when the user never saved any.
    pub async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>, AppError> {
        let rows = self
            .store
            .select(&Query::table(USER_SETTINGS).eq("user_id", user_id).limit(1))
            .await?;
        match rows.into_iter().next().and_then(|mut r| r.remove("settings")) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (Arc<MemoryStore>, UserService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), UserService::new(store))
    }

    fn new_user() -> NewUser {
        NewUser {
            auth_id: "auth-1".to_string(),
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn created_users_get_an_internal_id_distinct_from_auth_id() {
        let (_, users) = service();
        let profile = users.create_user(&new_user()).await.unwrap();
        assert_ne!(profile.user_id, "auth-1");
        assert_eq!(profile.auth_id.as_deref(), Some("auth-1"));
        assert_eq!(profile.is_active, Some(true));

        let fetched = users.get_profile("auth-1").await.unwrap();
        assert_eq!(fetched, profile);
        assert_eq!(users.get_user_by_id(&profile.user_id).await.unwrap(), profile);
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let (_, users) = service();
        assert!(matches!(
            users.get_profile("nobody").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn roles_are_checked_by_internal_id() {
        let (store, users) = service();
        users.set_user_role("p1", "regular").await.unwrap();
        assert!(users.has_role("p1", "regular").await);
        assert!(!users.has_role("p1", "admin").await);

        store.fail_table(USER_ROLES);
        assert!(!users.has_role("p1", "regular").await);
    }

    #[tokio::test]
    async fn last_login_and_profile_updates_are_written() {
        let (store, users) = service();
        users.create_user(&new_user()).await.unwrap();
        users.update_last_login("auth-1").await.unwrap();
        assert!(store.rows(USERS)[0]["last_login"].is_string());

        let form = ProfileForm {
            username: "ada2".to_string(),
            email: "ada2@example.com".to_string(),
            full_name: "Ada King".to_string(),
        };
        let updated = users.update_profile("auth-1", &form).await.unwrap();
        assert_eq!(ProfileForm::from(&updated), form);
    }

    #[tokio::test]
    async fn latest_service_selection_replaces_the_previous_one() {
        let (_, users) = service();
        assert_eq!(users.get_user_service("p1").await.unwrap(), None);
        users.save_service_selection("p1", 1).await.unwrap();
        users.save_service_selection("p1", 2).await.unwrap();
        let selected = users.get_user_service("p1").await.unwrap().unwrap();
        assert_eq!(selected["service_id"], json!(2));
    }

    #[tokio::test]
    async fn settings_round_trip_through_the_store() {
        let (_, users) = service();
        assert_eq!(users.get_settings("p1").await.unwrap(), None);
        let settings = UserSettings {
            dark_mode: true,
            ..UserSettings::default()
        };
        assert_eq!(users.save_settings("p1", &settings).await.unwrap(), settings);
        assert_eq!(users.get_settings("p1").await.unwrap(), Some(settings));
    }
}
