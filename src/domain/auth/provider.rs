use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// ============================================================================
// Auth Provider - Email/password identity
// ============================================================================
//
// The hosted identity service sits behind this trait. Errors carry the
// provider's `auth/...` code; mapping to user-facing messages happens in
// `AuthError::from_provider`.
//
// ============================================================================

/// Consecutive wrong passwords before an account is locked
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    async fn current_user(&self) -> Option<AuthUser>;

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password: String,
    failed_attempts: u32,
}

/// Process-local provider used by tests and the demo binary
#[derive(Default)]
pub struct InMemoryAuthProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<AuthUser>>,
    reset_requests: RwLock<Vec<String>>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return its uid
    pub async fn register(&self, email: &str, password: &str) -> String {
        let uid = uuid::Uuid::new_v4().simple().to_string();
        self.accounts.write().await.insert(
            normalize_email(email),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
                failed_attempts: 0,
            },
        );
        uid
    }

    /// Addresses a reset link was sent to, oldest first
    pub async fn reset_requests(&self) -> Vec<String> {
        self.reset_requests.read().await.clone()
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ProviderError> {
        let email = normalize_email(email);
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&email)
            .ok_or_else(|| ProviderError::new("auth/user-not-found", "no user record"))?;

        if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
            return Err(ProviderError::new(
                "auth/too-many-requests",
                "access temporarily disabled",
            ));
        }
        if account.password != password {
            account.failed_attempts += 1;
            tracing::debug!(email = %email, failed_attempts = account.failed_attempts, "Sign-in rejected");
            return Err(ProviderError::new("auth/wrong-password", "password is invalid"));
        }

        account.failed_attempts = 0;
        let user = AuthUser {
            uid: account.uid.clone(),
            email,
        };
        *self.current.write().await = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        *self.current.write().await = None;
        Ok(())
    }

    async fn current_user(&self) -> Option<AuthUser> {
        self.current.read().await.clone()
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        let email = normalize_email(email);
        if !self.accounts.read().await.contains_key(&email) {
            return Err(ProviderError::new("auth/user-not-found", "no user record"));
        }
        self.reset_requests.write().await.push(email);
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
