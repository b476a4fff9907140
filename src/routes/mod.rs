//! The application's route table and how each path is gated.
//!
//! Pages are either open, protected (signed-in only) or public-only
//! (signed-out only). Any path not in the table falls through to a catch-all
//! that sends visitors to the dashboard or the home page.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::auth::{Guard, GuardMode, GuardOutcome, GuardState, SessionState};
use crate::config::RoutesConfig;
use crate::metrics::{Metrics, MetricsRecorder};

const OPEN_PAGES: [&str; 6] = [
    "/about",
    "/services",
    "/blog",
    "/contact",
    "/faq",
    "/email-confirmation",
];
const PUBLIC_ONLY_PAGES: [&str; 2] = ["/login", "/signup"];
const PROTECTED_PAGES: [&str; 2] = ["/room-finder", "/vote"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Open,
    Guarded(Guard),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub access: Access,
}

/// What the router should do for a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "path", rename_all = "snake_case")]
pub enum Resolution {
    Loading,
    Render(String),
    Redirect(String),
}

pub struct RouteTable {
    routes: Vec<Route>,
    config: RoutesConfig,
    metrics: Metrics,
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Builds the table for the configured login, home and dashboard paths.
pub fn create_route_table(config: &RoutesConfig, metrics: Metrics) -> RouteTable {
    let mut routes = vec![Route {
        path: config.home.clone(),
        access: Access::Open,
    }];
    routes.extend(OPEN_PAGES.iter().map(|p| Route {
        path: p.to_string(),
        access: Access::Open,
    }));
    let public_only = Guard::new(GuardMode::PublicOnly, config.dashboard.clone());
    routes.extend(
        std::iter::once(config.login.as_str())
            .chain(PUBLIC_ONLY_PAGES.iter().copied())
            .map(|p| Route {
                path: p.to_string(),
                access: Access::Guarded(public_only.clone()),
            }),
    );
    let protect = Guard::new(GuardMode::Protect, config.login.clone());
    routes.extend(
        std::iter::once(config.dashboard.as_str())
            .chain(PROTECTED_PAGES.iter().copied())
            .map(|p| Route {
                path: p.to_string(),
                access: Access::Guarded(protect.clone()),
            }),
    );
    let mut seen = HashSet::new();
    routes.retain(|r| seen.insert(r.path.clone()));

    RouteTable {
        routes,
        config: config.clone(),
        metrics,
    }
}

impl RouteTable {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn find(&self, path: &str) -> Option<&Route> {
        let path = normalize(path);
        self.routes.iter().find(|r| r.path == path)
    }

    pub fn resolve(&self, path: &str, session: &SessionState) -> Resolution {
        let state = session.guard_state();
        let resolution = match self.find(path) {
            Some(Route {
                path,
                access: Access::Open,
            }) => Resolution::Render(path.clone()),
            Some(Route {
                path,
                access: Access::Guarded(guard),
            }) => {
                let outcome = guard.outcome(state);
                self.metrics
                    .record_guard_decision(guard.mode.as_str(), outcome.as_str());
                match outcome {
                    GuardOutcome::Loading => Resolution::Loading,
                    GuardOutcome::Render => Resolution::Render(path.clone()),
                    GuardOutcome::Redirect(to) => Resolution::Redirect(to),
                }
            }
            None => {
                self.metrics.record_guard_decision("catch_all", state.as_str());
                match state {
                    GuardState::Pending => Resolution::Loading,
                    GuardState::Admitted => Resolution::Redirect(self.config.dashboard.clone()),
                    GuardState::Denied => Resolution::Redirect(self.config.home.clone()),
                }
            }
        };
        debug!(
            path,
            guard_state = state.as_str(),
            resolution = ?resolution,
            "Route resolved"
        );
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    fn table() -> RouteTable {
        create_route_table(&RoutesConfig::default(), Metrics::new())
    }

    fn admitted() -> SessionState {
        SessionState::resolved(Some(Identity::new("u1", "a@b.com")))
    }

    #[test]
    fn protected_pages_redirect_denied_visitors_to_login() {
        let table = table();
        let denied = SessionState::resolved(None);
        for path in ["/dashboard", "/room-finder", "/vote/"] {
            assert_eq!(
                table.resolve(path, &denied),
                Resolution::Redirect("/login".to_string())
            );
        }
        assert_eq!(
            table.resolve("/dashboard", &admitted()),
            Resolution::Render("/dashboard".to_string())
        );
    }

    #[test]
    fn login_and_signup_send_signed_in_users_to_the_dashboard() {
        let table = table();
        assert_eq!(
            table.resolve("/signup", &admitted()),
            Resolution::Redirect("/dashboard".to_string())
        );
        assert_eq!(
            table.resolve("/login?next=x", &SessionState::resolved(None)),
            Resolution::Render("/login".to_string())
        );
    }

    #[test]
    fn open_pages_render_even_while_pending() {
        let table = table();
        assert_eq!(
            table.resolve("/", &SessionState::pending()),
            Resolution::Render("/".to_string())
        );
        assert_eq!(
            table.resolve("/faq", &SessionState::pending()),
            Resolution::Render("/faq".to_string())
        );
        assert_eq!(
            table.resolve("/dashboard", &SessionState::pending()),
            Resolution::Loading
        );
    }

    #[test]
    fn unknown_paths_fall_through_to_catch_all() {
        let table = table();
        assert_eq!(table.resolve("/nope", &SessionState::pending()), Resolution::Loading);
        assert_eq!(
            table.resolve("/nope", &admitted()),
            Resolution::Redirect("/dashboard".to_string())
        );
        assert_eq!(
            table.resolve("/nope", &SessionState::resolved(None)),
            Resolution::Redirect("/".to_string())
        );
    }

    #[test]
    fn configured_paths_never_duplicate_built_in_pages() {
        let config = RoutesConfig {
            dashboard: "/vote".to_string(),
            ..RoutesConfig::default()
        };
        let table = create_route_table(&config, Metrics::new());

        let mut paths: Vec<&str> = table.routes().iter().map(|r| r.path.as_str()).collect();
        let total = paths.len();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), total);
        assert_eq!(
            table.routes().iter().filter(|r| r.path == "/vote").count(),
            1
        );
        assert_eq!(
            table.resolve("/login", &admitted()),
            Resolution::Redirect("/vote".to_string())
        );
    }

    #[test]
    fn decisions_are_counted() {
        let metrics = Metrics::new();
        let table = create_route_table(&RoutesConfig::default(), metrics.clone());
        table.resolve("/vote", &SessionState::resolved(None));
        assert!(metrics
            .render()
            .contains("guard_decisions_total{mode=\"protect\",outcome=\"redirect\"} 1"));
    }
}
