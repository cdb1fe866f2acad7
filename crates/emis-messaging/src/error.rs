//! Error types for the emis-messaging crate.

use crate::store::StoreError;
use thiserror::Error;

/// Errors from the messaging pipeline.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Durable storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Publishing a derived event failed.
    #[error("Failed to publish derived event: {cause}")]
    Publish { cause: String },

    /// Realtime broadcast failed.
    #[error("Realtime broadcast to group {group_id} failed: {cause}")]
    Broadcast { group_id: String, cause: String },
}

impl MessagingError {
    /// Returns true if retrying the triggering delivery may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MessagingError::Store(e) => e.is_transient(),
            MessagingError::Publish { .. } | MessagingError::Broadcast { .. } => true,
        }
    }
}
