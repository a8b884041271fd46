use crate::store::StoreError;

// ============================================================================
// Category Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CategoryError {
    #[error("Invalid category: {0}")]
    Validation(String),

    #[error("Category with this name already exists: {0}")]
    Duplicate(String),

    #[error("Cannot delete category - it is being used by {0} products")]
    InUse(usize),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Category write failed: {0}")]
    Transaction(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<StoreError> for CategoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => CategoryError::NotFound(path),
            StoreError::AlreadyExists(path) => CategoryError::Duplicate(path),
            StoreError::InvalidArgument(msg) => CategoryError::Validation(msg),
            StoreError::Internal(msg) => CategoryError::Unknown(msg),
            other => CategoryError::Transaction(other.to_string()),
        }
    }
}
