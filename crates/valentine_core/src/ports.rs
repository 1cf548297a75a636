//! crates/valentine_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or the
//! browser's clipboard.

use async_trait::async_trait;

use crate::domain::{Code, NewValentine, Reply, ValentineRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A record with the same code already exists.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The reply has already been recorded and cannot be overwritten.
    #[error("Already answered: {0}")]
    AlreadyAnswered(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote datastore: one logical table of valentines keyed by code.
#[async_trait]
pub trait ValentineStore: Send + Sync {
    /// Returns `Ok(None)` when no record has this code.
    async fn find_by_code(&self, code: &Code) -> PortResult<Option<ValentineRecord>>;

    /// Inserts a new unanswered record.
    ///
    /// Fails with `PortError::Conflict` if the code is already taken.
    async fn insert(&self, valentine: NewValentine) -> PortResult<ValentineRecord>;

    /// Records the reply and stamps `replied_at` with the store's clock.
    ///
    /// The first reply wins: once set, further calls fail with
    /// `PortError::AlreadyAnswered` and the stored record is unchanged.
    async fn record_reply(&self, code: &Code, reply: Reply) -> PortResult<ValentineRecord>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("Copy failed: {0}")]
    Failed(String),
}

/// Copy-to-clipboard access provided by the host environment.
pub trait Clipboard {
    /// The primary clipboard API.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Fallback that selects the text and issues a synchronous copy command.
    fn select_and_copy(&self, text: &str) -> Result<(), ClipboardError>;
}
