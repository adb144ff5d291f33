pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod openapi;
pub mod repo;
pub mod routes;

// Re-export commonly used items for tests / external users
pub use notify::{create_notification, NotifyPolicy};
pub use routes::{config, AppState};
