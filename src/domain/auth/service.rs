use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metrics::Metrics;
use crate::store::{collections, DocRef, DocumentStore};

use super::errors::AuthError;
use super::provider::AuthProvider;
use super::session::{PersistedSession, SessionPersistence};

// ============================================================================
// Admin Auth Service
// ============================================================================
//
// Signing in with the identity provider is not enough: the uid must also
// have an `admins/{uid}` document whose role is `admin`. Anyone else is
// signed straight back out.
//
// ============================================================================

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub uid: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AdminRecord {
    #[serde(default)]
    role: String,
}

pub struct AdminAuthService {
    provider: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    session: Arc<dyn SessionPersistence>,
    metrics: Arc<Metrics>,
}

impl AdminAuthService {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        session: Arc<dyn SessionPersistence>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            store,
            session,
            metrics,
        }
    }

    pub async fn login_admin(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<AdminUser, AuthError> {
        self.metrics
            .observe("login_admin", async move {
                let user = self.provider.sign_in(email, password).await?;

                let role = match self.admin_role(&user.uid).await? {
                    Some(role) => role,
                    None => {
                        self.provider.sign_out().await?;
                        tracing::warn!(uid = %user.uid, "Sign-in without admin record");
                        return Err(AuthError::NotAdmin);
                    }
                };
                if role != ADMIN_ROLE {
                    self.provider.sign_out().await?;
                    tracing::warn!(uid = %user.uid, role = %role, "Sign-in with insufficient role");
                    return Err(AuthError::InsufficientPermissions);
                }

                if remember_me {
                    self.session
                        .save(&PersistedSession {
                            email: email.to_string(),
                            uid: user.uid.clone(),
                        })
                        .await?;
                } else {
                    self.session.clear().await?;
                }

                tracing::info!(uid = %user.uid, remember_me, "Admin signed in");
                Ok::<_, AuthError>(AdminUser {
                    uid: user.uid,
                    email: user.email,
                    role,
                })
            })
            .await
    }

    /// Restore a remembered session. The provider must still hold the same
    /// user and the admin role is checked again; otherwise the remembered
    /// session is dropped and `None` is returned.
    pub async fn check_persisted_auth(&self) -> Result<Option<AdminUser>, AuthError> {
        let result: Result<Option<AdminUser>, AuthError> = self
            .metrics
            .observe("check_persisted_auth", async {
                let Some(persisted) = self.session.load().await? else {
                    return Ok(None);
                };

                let signed_in = self.provider.current_user().await;
                if signed_in.as_ref().map(|u| u.uid.as_str()) != Some(persisted.uid.as_str()) {
                    self.session.clear().await?;
                    tracing::debug!(uid = %persisted.uid, "Remembered session no longer signed in");
                    return Ok(None);
                }

                match self.admin_role(&persisted.uid).await? {
                    Some(role) if role == ADMIN_ROLE => Ok(Some(AdminUser {
                        uid: persisted.uid,
                        email: persisted.email,
                        role,
                    })),
                    _ => {
                        self.provider.sign_out().await?;
                        self.session.clear().await?;
                        tracing::warn!(uid = %persisted.uid, "Remembered session lost admin role");
                        Ok(None)
                    }
                }
            })
            .await;

        match result {
            Ok(admin) => Ok(admin),
            Err(err) => {
                tracing::warn!(error = %err, "Session validation failed");
                if let Err(clear_err) = self.session.clear().await {
                    tracing::error!(error = %clear_err, "Failed to clear remembered session");
                }
                Err(AuthError::SessionInvalid)
            }
        }
    }

    pub async fn logout_admin(&self) -> Result<(), AuthError> {
        self.metrics
            .observe("logout_admin", async {
                self.provider.sign_out().await?;
                self.session.clear().await?;
                tracing::info!("Admin signed out");
                Ok::<_, AuthError>(())
            })
            .await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() {
            return Err(AuthError::Provider("Email is required".to_string()));
        }
        self.metrics
            .observe("reset_password", async move {
                self.provider.send_password_reset(email).await?;
                tracing::info!("Password reset requested");
                Ok::<_, AuthError>(())
            })
            .await
    }

    async fn admin_role(&self, uid: &str) -> Result<Option<String>, AuthError> {
        let record = self.store.get(&DocRef::new(collections::ADMINS, uid)).await?;
        Ok(record
            .map(|doc| doc.decode::<AdminRecord>())
            .transpose()?
            .map(|admin| admin.role))
    }
}
