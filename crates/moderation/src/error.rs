//! Error taxonomy shared by report filing and moderation actions
//!
//! Every variant except `StoreUnavailable` is raised before any write is
//! attempted. `StoreUnavailable` means the transaction was aborted as a whole
//! and the request may be retried.

use storage::DatabaseError;
use thiserror::Error;

/// Errors that can occur during report and moderation operations
#[derive(Debug, Error)]
pub enum ModerationError {
    /// Malformed input: empty reason, unknown action name, bad paging
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller lacks moderator capability
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Report, content or user absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Report not pending, or a duplicate pending report
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Storage failed; nothing was committed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ModerationError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<DatabaseError> for ModerationError {
    fn from(err: DatabaseError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<sqlx::Error> for ModerationError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Result type for moderation operations
pub type Result<T> = std::result::Result<T, ModerationError>;
