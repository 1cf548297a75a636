//! services/api/src/error.rs
//!
//! Errors that can stop the API service from starting or serving.

use crate::config::ConfigError;
use axum::http::header::InvalidHeaderValue;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting to Postgres failed.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// `ALLOWED_ORIGIN` is not usable as a CORS header value.
    #[error("Invalid allowed origin '{origin}': {source}")]
    InvalidOrigin {
        origin: String,
        source: InvalidHeaderValue,
    },

    /// Binding or serving on the listen address failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
