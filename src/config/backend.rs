use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::Row;
use crate::providers::plain_provider::PlainUserEntry;

/// Which managed backend the client talks to. Differentiated via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "supabase")]
    Supabase(SupabaseConfig),
    /// In-process backend: configured users plus seeded tables.
    #[serde(rename = "memory")]
    Memory(MemoryBackendConfig),
}

/// Connection details for a Supabase-compatible project.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct MemoryBackendConfig {
    #[serde(default)]
    pub users: Vec<PlainUserEntry>,
    /// Seed rows per table name.
    #[serde(default)]
    pub tables: HashMap<String, Vec<Row>>,
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,
}

fn default_bucket() -> String {
    "rooms".to_string()
}
