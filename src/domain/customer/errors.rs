use crate::store::StoreError;

// ============================================================================
// Customer Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CustomerError {
    #[error("Name, email, and phone are required")]
    MissingFields,

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Customer not found: {0}")]
    NotFound(String),

    #[error("Customer request failed: {0}")]
    Transaction(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<StoreError> for CustomerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => CustomerError::NotFound(path),
            StoreError::Internal(msg) => CustomerError::Unknown(msg),
            other => CustomerError::Transaction(other.to_string()),
        }
    }
}
