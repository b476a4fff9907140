//! Assembles the dashboard view-model for a signed-in identity.
//!
//! The profile is read first because every other query is keyed by its
//! internal `user_id`, not the provider identity. The remaining four queries
//! run concurrently and each one that fails only leaves its own field at the
//! default.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join4;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::{GuardState, SessionState};
use crate::config::DashboardConfig;
use crate::error::AppError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{Activity, Identity, Profile, ProfileForm, UserSettings};
use crate::providers::IdentityProvider;
use crate::services::UserService;
use crate::store::base::from_rows;
use crate::store::{Query, RemoteStore};
use crate::utils::log_throttle::LogThrottle;

const FAILURE_LOG_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub room_bookings: u64,
    /// Polls whose window contains the load time.
    pub active_polls: u64,
    pub votes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardView {
    /// Cached copy; stale until the user saves again.
    pub profile: Option<Profile>,
    pub edit_form: ProfileForm,
    pub stats: DashboardStats,
    pub recent_activities: Vec<Activity>,
    pub settings: UserSettings,
}

impl DashboardView {
    /// Resets the edit form to the cached profile.
    pub fn discard_edits(&mut self) {
        self.edit_form = self
            .profile
            .as_ref()
            .map(ProfileForm::from)
            .unwrap_or_default();
    }
}

pub struct DashboardAggregator {
    store: Arc<dyn RemoteStore>,
    provider: Arc<dyn IdentityProvider>,
    users: UserService,
    config: DashboardConfig,
    metrics: Metrics,
    /// One failure warning per sub-query per window.
    failure_logs: LogThrottle,
}

impl DashboardAggregator {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        provider: Arc<dyn IdentityProvider>,
        config: DashboardConfig,
        metrics: Metrics,
    ) -> Self {
        DashboardAggregator {
            users: UserService::new(store.clone()),
            store,
            provider,
            config,
            metrics,
            failure_logs: LogThrottle::new(),
        }
    }

    /// Runs one sub-query, recording its outcome. Failures are logged and become `None`.
    async fn measured<T, F>(&self, query: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let started = Instant::now();
        let result = fut.await;
        self.metrics
            .record_dashboard_duration(query, started.elapsed().as_secs_f64());
        match result {
            Ok(value) => {
                self.metrics.record_dashboard_query(query, "success");
                Some(value)
            }
            Err(e) => {
                self.metrics.record_dashboard_query(query, e.kind());
                if let Some(suppressed) = self.failure_logs.check(query, FAILURE_LOG_WINDOW) {
                    warn!(
                        event_name = "dashboard.query.failed",
                        event_domain = "roomboard",
                        query,
                        error_kind = e.kind(),
                        error = %e,
                        suppressed,
                        "Error fetching dashboard data"
                    );
                }
                None
            }
        }
    }

    pub async fn load(&self, identity: &Identity) -> DashboardView {
        self.load_at(identity, Utc::now()).await
    }

    /// Same as [`load`](Self::load) with an explicit "now" for the active-polls window.
    pub async fn load_at(&self, identity: &Identity, now: DateTime<Utc>) -> DashboardView {
        let mut view = DashboardView::default();

        let Some(profile) = self
            .measured("profile", self.users.get_profile(&identity.id))
            .await
        else {
            return view;
        };
        let user_id = profile.user_id.clone();
        view.edit_form = ProfileForm::from(&profile);
        view.profile = Some(profile);

        let now = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let bookings = Query::table("room_bookings").eq("user_id", user_id.as_str());
        let polls = Query::table("polls")
            .gt("end_date", now.as_str())
            .lt("start_date", now.as_str());
        let votes = Query::table("votes").eq("user_id", user_id.as_str());
        let limit = self.config.recent_activity_limit;

        let (room_bookings, active_polls, user_votes, activities) = join4(
            self.measured("bookings", self.store.count(&bookings)),
            self.measured("active_polls", self.store.count(&polls)),
            self.measured("votes", self.store.count(&votes)),
            self.measured("recent_activities", async {
                let rows = self
                    .store
                    .rpc("get_user_activities", json!({ "user_id": user_id }), Some(limit))
                    .await?;
                from_rows::<Activity>(rows)
            }),
        )
        .await;

        view.stats = DashboardStats {
            room_bookings: room_bookings.unwrap_or_default(),
            active_polls: active_polls.unwrap_or_default(),
            votes: user_votes.unwrap_or_default(),
        };
        view.recent_activities = activities.unwrap_or_default();
        view.recent_activities.truncate(limit);

        if let Some(Some(settings)) = self
            .measured("settings", self.users.get_settings(&user_id))
            .await
        {
            view.settings = settings;
        }

        debug!(
            user_id = user_id.as_str(),
            stats = ?view.stats,
            activities = view.recent_activities.len(),
            "Dashboard loaded"
        );
        view
    }

    /// Loads only for an admitted session.
    pub async fn load_for(&self, session: &SessionState) -> Option<DashboardView> {
        match (session.guard_state(), session.identity.as_ref()) {
            (GuardState::Admitted, Some(identity)) => Some(self.load(identity).await),
            _ => None,
        }
    }

    /// Writes the edit form. The provider email is changed first when it differs;
    /// local state only changes once both writes succeed.
    pub async fn save_profile(
        &self,
        identity: &Identity,
        view: &mut DashboardView,
        form: ProfileForm,
    ) -> Result<(), AppError> {
        let result = async {
            if form.email != identity.email {
                self.provider.update_user(&form.email).await?;
            }
            self.users.update_profile(&identity.id, &form).await
        }
        .await;

        match result {
            Ok(profile) => {
                info!(
                    event_name = "dashboard.profile.saved",
                    event_domain = "roomboard",
                    user_id = profile.user_id.as_str(),
                    "Profile updated successfully"
                );
                view.edit_form = ProfileForm::from(&profile);
                view.profile = Some(profile);
                Ok(())
            }
            Err(e) => {
                warn!(auth_id = identity.id.as_str(), error = %e, "Error updating profile");
                Err(e)
            }
        }
    }

    pub async fn save_settings(
        &self,
        view: &mut DashboardView,
        settings: UserSettings,
    ) -> Result<(), AppError> {
        let Some(profile) = view.profile.as_ref() else {
            return Err(AppError::not_found("Profile not loaded"));
        };
        match self.users.save_settings(&profile.user_id, &settings).await {
            Ok(stored) => {
                view.settings = stored;
                Ok(())
            }
            Err(e) => {
                warn!(user_id = profile.user_id.as_str(), error = %e, "Error saving settings");
                Err(e)
            }
        }
    }
}
