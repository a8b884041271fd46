use crate::store::StoreError;

// ============================================================================
// Product Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProductError {
    #[error("Invalid product: {0}")]
    Validation(String),

    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Product write failed: {0}")]
    Transaction(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<StoreError> for ProductError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => ProductError::NotFound(path),
            StoreError::InvalidArgument(msg) => ProductError::Validation(msg),
            StoreError::Internal(msg) => ProductError::Unknown(msg),
            other => ProductError::Transaction(other.to_string()),
        }
    }
}
