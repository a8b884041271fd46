use serde_json::Value;

// ============================================================================
// Store Errors - Provider-level failure codes
// ============================================================================
//
// Every store implementation reports failures through this enum. Domain
// repositories translate these into their own closed error sets; nothing
// above the repository layer matches on store codes directly.
//
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Precondition failed on {doc} ({field}): {reason}")]
    FailedPrecondition {
        doc: String,
        field: String,
        actual: Option<Value>,
        reason: String,
    },

    #[error("Transaction aborted: {0}")]
    Aborted(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Stable, provider-style error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not-found",
            StoreError::AlreadyExists(_) => "already-exists",
            StoreError::FailedPrecondition { .. } => "failed-precondition",
            StoreError::Aborted(_) => "aborted",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::InvalidArgument(_) => "invalid-argument",
            StoreError::Internal(_) => "internal",
        }
    }

    /// Path of the document a not-found error refers to
    pub fn missing_document(&self) -> Option<&str> {
        match self {
            StoreError::NotFound(path) => Some(path),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Internal(format!("document (de)serialization failed: {}", err))
    }
}
