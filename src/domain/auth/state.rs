use super::errors::AuthError;
use super::service::{AdminAuthService, AdminUser};
use crate::state::{track, RequestState};

// ============================================================================
// Auth State - Signed-in admin
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub user: Option<AdminUser>,
    pub is_authenticated: bool,
    pub request: RequestState,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_error(&mut self) {
        self.request.clear_error();
    }

    pub async fn login(
        &mut self,
        service: &AdminAuthService,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<(), AuthError> {
        let admin = track(&mut self.request, service.login_admin(email, password, remember_me)).await?;
        self.user = Some(admin);
        self.is_authenticated = true;
        Ok(())
    }

    /// Restore a remembered admin; leaves the state untouched when there is
    /// nothing to restore
    pub async fn check_persisted(&mut self, service: &AdminAuthService) -> Result<(), AuthError> {
        if let Some(admin) = track(&mut self.request, service.check_persisted_auth()).await? {
            self.user = Some(admin);
            self.is_authenticated = true;
        }
        Ok(())
    }

    pub async fn logout(&mut self, service: &AdminAuthService) -> Result<(), AuthError> {
        track(&mut self.request, service.logout_admin()).await?;
        self.user = None;
        self.is_authenticated = false;
        Ok(())
    }

    pub async fn reset_password(&mut self, service: &AdminAuthService, email: &str) -> Result<(), AuthError> {
        track(&mut self.request, service.reset_password(email)).await
    }
}
