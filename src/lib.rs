pub mod api;
pub mod db;
pub mod error;
pub mod identity;
pub mod linker;
pub mod payload;
pub mod verify;

use serde::Deserialize;
use std::sync::Arc;

use crate::db::sources::SourceStore;
use crate::db::tracker::TrackerStore;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8899";
pub const DEFAULT_DATABASE_PATH: &str = "ticketlink.db";

#[derive(Debug, Deserialize, Clone)]
pub struct ListenerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
        }
    }
}

pub struct AppState {
    pub sources: SourceStore,
    pub tracker: TrackerStore,
}

pub type SharedState = Arc<AppState>;
