use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::backend::BackendConfig;
use super::logging::LoggingConfig;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ROOMBOARD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
const ENV_PREFIX: &str = "ROOMBOARD_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
    pub app: AppConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Site-level settings used to build redirect URLs.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct AppConfig {
    /// Public origin of the application, e.g. `http://localhost:5173`.
    pub site_url: String,
    /// Role assigned to every newly registered user.
    #[serde(default = "default_role")]
    pub default_role: String,
    #[serde(default = "default_oauth_provider")]
    pub oauth_provider: String,
}

impl AppConfig {
    pub fn reset_password_url(&self) -> String {
        format!("{}/reset-password", self.site_url.trim_end_matches('/'))
    }

    pub fn oauth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.site_url.trim_end_matches('/'))
    }
}

/// Paths the route guards redirect to.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct RoutesConfig {
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_home_path")]
    pub home: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        RoutesConfig {
            login: default_login_path(),
            home: default_home_path(),
            dashboard: default_dashboard_path(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct DashboardConfig {
    #[serde(default = "default_recent_activity_limit")]
    pub recent_activity_limit: usize,
    #[serde(default = "default_clock_refresh_secs")]
    pub clock_refresh_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            recent_activity_limit: default_recent_activity_limit(),
            clock_refresh_secs: default_clock_refresh_secs(),
        }
    }
}

/// Where the Prometheus exposition is written when a run ends.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, JsonSchema)]
pub struct MetricsConfig {
    /// File path, or `-` for stderr. Nothing is written when unset.
    #[serde(default)]
    pub output: Option<String>,
}

/// Load config from `./config.yaml` (or `$ROOMBOARD_CONFIG`) merged with
/// `ROOMBOARD_*` environment variables. Exits the process on error.
pub fn load_config() -> ConfigV1 {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let figment = Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]));
    match parse_config(figment) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Extract a `ConfigV1` from an already assembled figment.
pub fn parse_config(figment: Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn default_role() -> String {
    "regular".to_string()
}

fn default_oauth_provider() -> String {
    "google".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_dashboard_path() -> String {
    "/dashboard".to_string()
}

fn default_recent_activity_limit() -> usize {
    3
}

fn default_clock_refresh_secs() -> u64 {
    60
}
