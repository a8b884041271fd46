use crate::store::StoreError;

use super::provider::ProviderError;

// ============================================================================
// Auth Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No admin found with this email")]
    UserNotFound,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("Account temporarily locked due to many failed attempts")]
    TooManyRequests,

    #[error("User is not an admin")]
    NotAdmin,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Session validation failed")]
    SessionInvalid,

    #[error("{0}")]
    Provider(String),

    #[error("Session storage error: {0}")]
    Session(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Map an auth provider error code to the message shown on the login form
    pub fn from_provider(code: &str, message: &str) -> Self {
        match code {
            "auth/user-not-found" => AuthError::UserNotFound,
            "auth/wrong-password" => AuthError::WrongPassword,
            "auth/too-many-requests" => AuthError::TooManyRequests,
            _ if message.is_empty() => AuthError::Provider("Login failed".to_string()),
            _ => AuthError::Provider(message.to_string()),
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        AuthError::from_provider(&err.code, &err.message)
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Unknown(err.to_string())
    }
}
