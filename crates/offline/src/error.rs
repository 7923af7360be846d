//! Sync-layer error model.

use thiserror::Error;

/// Errors crossing the local/remote boundary.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("client is offline")]
    Offline,
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("local store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Whether the failure is a connectivity problem rather than the
    /// operation's fault. Connectivity failures leave queue entries
    /// untouched; operation failures count against the retry budget.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SyncError::Offline | SyncError::Network(_))
    }
}
