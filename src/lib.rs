pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod hotels;
pub mod identity;
pub mod models;
pub mod oauth;
pub mod openapi;
pub mod rate_limit;
pub mod repo;
pub mod retry;
pub mod routes;
pub mod security;
pub mod storage;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
