//! # emberkv-server
//!
//! HTTP surface over the cache core, plus server configuration.
//!
//! The handlers translate query parameters into cache calls and cache
//! outcomes into status codes; they never touch the WAL directly.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use handlers::{AppState, HttpCache};
pub use routes::create_router;
