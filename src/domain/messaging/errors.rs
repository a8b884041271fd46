use crate::store::StoreError;

// ============================================================================
// Messaging Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MessagingError {
    #[error("Invalid message request: {0}")]
    Validation(String),

    #[error("{user} is not part of conversation {conversation}")]
    NotParticipant { conversation: String, user: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Messaging write failed: {0}")]
    Transaction(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<StoreError> for MessagingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => MessagingError::NotFound(path),
            StoreError::InvalidArgument(msg) => MessagingError::Validation(msg),
            StoreError::Internal(msg) => MessagingError::Unknown(msg),
            other => MessagingError::Transaction(other.to_string()),
        }
    }
}
