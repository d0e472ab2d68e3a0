//! HTTP handlers: the inbound webhook endpoint and the source admin API

pub mod sources;
pub mod webhook;

// Re-export handlers
pub use sources::{delete_source, list_sources, register_source, update_branch_filter};
pub use webhook::handle_webhook;
