//! Route gating as a pure function of the session state.

use serde::Serialize;

use super::session::SessionState;

/// The three states a guard can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// The initial existence check is still running.
    Pending,
    Admitted,
    Denied,
}

impl GuardState {
    pub fn from_flags(loading: bool, is_authenticated: bool) -> Self {
        match (loading, is_authenticated) {
            (true, _) => GuardState::Pending,
            (false, true) => GuardState::Admitted,
            (false, false) => GuardState::Denied,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GuardState::Pending => "pending",
            GuardState::Admitted => "admitted",
            GuardState::Denied => "denied",
        }
    }
}

/// Which state sends the visitor away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardMode {
    /// Render when admitted, redirect when denied.
    Protect,
    /// Render when denied, redirect when admitted (login, signup).
    PublicOnly,
}

impl GuardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardMode::Protect => "protect",
            GuardMode::PublicOnly => "public_only",
        }
    }

    pub fn default_fallback(&self) -> &'static str {
        match self {
            GuardMode::Protect => "/login",
            GuardMode::PublicOnly => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "to", rename_all = "snake_case")]
pub enum GuardOutcome {
    /// Show a neutral loading indicator and do not navigate.
    Loading,
    Render,
    Redirect(String),
}

impl GuardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardOutcome::Loading => "loading",
            GuardOutcome::Render => "render",
            GuardOutcome::Redirect(_) => "redirect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub mode: GuardMode,
    pub fallback: String,
}

impl Guard {
    pub fn new(mode: GuardMode, fallback: impl Into<String>) -> Self {
        Guard {
            mode,
            fallback: fallback.into(),
        }
    }

    pub fn protect() -> Self {
        Self::new(GuardMode::Protect, GuardMode::Protect.default_fallback())
    }

    pub fn public_only() -> Self {
        Self::new(GuardMode::PublicOnly, GuardMode::PublicOnly.default_fallback())
    }

    pub fn outcome(&self, state: GuardState) -> GuardOutcome {
        match (self.mode, state) {
            (_, GuardState::Pending) => GuardOutcome::Loading,
            (GuardMode::Protect, GuardState::Admitted)
            | (GuardMode::PublicOnly, GuardState::Denied) => GuardOutcome::Render,
            (GuardMode::Protect, GuardState::Denied)
            | (GuardMode::PublicOnly, GuardState::Admitted) => {
                GuardOutcome::Redirect(self.fallback.clone())
            }
        }
    }

    pub fn decide(&self, session: &SessionState) -> GuardOutcome {
        self.outcome(session.guard_state())
    }
}
