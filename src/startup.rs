//! Application startup: session lifecycle and the dashboard route.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::auth::LoginForm;
use crate::config::{ConfigV1, MetricsConfig};
use crate::dashboard::ClockReading;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::routes::Resolution;
use crate::state::AppState;

const EMAIL_ENV: &str = "ROOMBOARD_EMAIL";
const PASSWORD_ENV: &str = "ROOMBOARD_PASSWORD";
const SIGN_IN_WAIT: Duration = Duration::from_secs(5);

/// Optional sign-in performed before the dashboard route is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        match (std::env::var(EMAIL_ENV), std::env::var(PASSWORD_ENV)) {
            (Ok(email), Ok(password)) if !email.is_empty() => Some(Credentials { email, password }),
            _ => None,
        }
    }
}

/// Signs in and waits for the session store to observe it.
pub async fn sign_in(state: &AppState, credentials: &Credentials) -> Result<(), AppError> {
    let form = LoginForm {
        email: credentials.email.clone(),
        password: credentials.password.clone(),
    };
    let identity = state.gateway.login(&form).await?;

    let mut session = state.session.watch();
    let observed = matches!(
        timeout(
            SIGN_IN_WAIT,
            session.wait_for(|s| s.identity.as_ref().map(|i| &i.id) == Some(&identity.id)),
        )
        .await,
        Ok(Ok(_))
    );
    if !observed {
        warn!(auth_id = identity.id.as_str(), "Session store did not observe the sign-in");
    }
    Ok(())
}

/// Resolves the dashboard route for the current session and renders the result.
pub async fn render_dashboard(state: &AppState) -> Value {
    let session = state.session.snapshot();
    let path = state.config.routes.dashboard.as_str();
    match state.routes.resolve(path, &session) {
        Resolution::Render(_) => {
            let reading = ClockReading::at(Local::now());
            let view = state.dashboard.load_for(&session).await;
            json!({
                "route": path,
                "greeting": reading.greeting,
                "time": reading.now.to_rfc3339(),
                "dashboard": view,
            })
        }
        other => json!({ "route": path, "resolution": other }),
    }
}

/// Writes the Prometheus exposition to the configured output, if any.
pub fn export_metrics(metrics: &Metrics, config: &MetricsConfig) -> std::io::Result<()> {
    let Some(output) = config.output.as_deref() else {
        return Ok(());
    };
    let text = metrics.render();
    if output == "-" {
        std::io::stderr().lock().write_all(text.as_bytes())?;
    } else {
        std::fs::write(output, text)?;
    }
    info!(output, "Metrics exported");
    Ok(())
}

/// Runs one session lifecycle: initialize, subscribe, optional sign-in, render, teardown.
pub async fn run(
    config: Arc<ConfigV1>,
    credentials: Option<Credentials>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config);
    info!(
        identity = state.backend.identity.get_name(),
        store = state.backend.store.get_name(),
        files = state.backend.files.get_name(),
        "Starting roomboard"
    );

    state.session.subscribe();
    let initial = state.session.initialize().await;
    info!(authenticated = initial.is_authenticated(), "Session resolved");

    if let Some(credentials) = credentials {
        if let Err(e) = sign_in(&state, &credentials).await {
            warn!(error = %e, "Sign-in failed");
        }
    }

    let output = render_dashboard(&state).await;
    println!("{}", serde_json::to_string_pretty(&output)?);

    state.session.teardown();
    if let Err(e) = export_metrics(&state.metrics, &state.config.metrics) {
        warn!(error = %e, "Could not export metrics");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRecorder;

    #[test]
    fn metrics_are_written_to_the_configured_file() {
        let metrics = Metrics::new();
        metrics.record_session_init("unauthenticated");
        metrics.record_guard_decision("protect", "redirect");

        let path = std::env::temp_dir().join(format!(
            "roomboard-metrics-{}.prom",
            uuid::Uuid::new_v4()
        ));
        let config = MetricsConfig {
            output: Some(path.to_string_lossy().into_owned()),
        };
        export_metrics(&metrics, &config).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(written.contains("session_initializations_total{result=\"unauthenticated\"} 1"));
        assert!(written.contains("guard_decisions_total"));
    }

    #[test]
    fn nothing_is_written_without_an_output() {
        let metrics = Metrics::new();
        export_metrics(&metrics, &MetricsConfig::default()).unwrap();
    }
}
