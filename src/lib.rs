//! Library exports for roomboard, shared between the binary and tests.

pub mod auth;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod files;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod routes;
pub mod services;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
