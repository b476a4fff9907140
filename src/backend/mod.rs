//! Wiring for the managed backend: identity, relational store and file store.

pub mod client;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

pub use client::SupabaseClient;

use crate::config::BackendConfig;
use crate::models::Row;
use crate::files::{FileStore, MemoryFiles, StorageFiles};
use crate::providers::{IdentityProvider, PlainProvider, SupabaseProvider};
use crate::store::{MemoryStore, RemoteStore, RestStore};

/// The three collaborators every higher-level component is built from.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn RemoteStore>,
    pub files: Arc<dyn FileStore>,
}

/// Creates the concrete backend described by the config.
pub fn create_backend(config: &BackendConfig) -> Backend {
    match config {
        BackendConfig::Supabase(cfg) => {
            info!(url = cfg.url.as_str(), "Using Supabase backend");
            let client = Arc::new(SupabaseClient::new(cfg));
            Backend {
                identity: Arc::new(SupabaseProvider::new(client.clone())),
                store: Arc::new(RestStore::new(client.clone())),
                files: Arc::new(StorageFiles::new(client, &cfg.storage_bucket)),
            }
        }
        BackendConfig::Memory(cfg) => {
            info!(
                users = cfg.users.len(),
                tables = cfg.tables.len(),
                "Using in-memory backend"
            );
            Backend {
                identity: Arc::new(PlainProvider::new(&cfg.users)),
                store: Arc::new(memory_store(&cfg.tables)),
                files: Arc::new(MemoryFiles::new(&cfg.storage_bucket)),
            }
        }
    }
}

/// Seeded in-memory store with serial keys and the activity feed function.
fn memory_store(tables: &HashMap<String, Vec<Row>>) -> MemoryStore {
    let store = MemoryStore::from_tables(tables)
        .with_serial("rooms", "room_id")
        .with_serial("buildings", "building_id")
        .with_serial("room_bookings", "booking_id");
    store.register_rpc("get_user_activities", |params, tables| {
        let user_id = params.get("user_id").cloned().unwrap_or(Value::Null);
        let mut rows: Vec<Row> = tables
            .get("user_activities")
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.get("user_id") == Some(&user_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| {
            let key = |r: &Row| {
                r.get("timestamp")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            key(b).cmp(&key(a))
        });
        Ok(rows)
    });
    store
}
