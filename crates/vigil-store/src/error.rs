//! Store error types

use thiserror::Error;
use vigil_types::InstanceId;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("ownership transfer failed for {instance}: {reason}")]
    TransferFailed {
        instance: InstanceId,
        reason: String,
    },
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
