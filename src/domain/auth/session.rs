use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::errors::AuthError;

// ============================================================================
// Session Persistence - "Remember me"
// ============================================================================
//
// Only the email and uid are persisted. The password never leaves the
// login call.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub email: String,
    pub uid: String,
}

#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError>;

    async fn load(&self) -> Result<Option<PersistedSession>, AuthError>;

    async fn clear(&self) -> Result<(), AuthError>;
}

#[derive(Default)]
pub struct MemorySession {
    slot: RwLock<Option<PersistedSession>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionPersistence for MemorySession {
    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError> {
        *self.slot.write().await = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<PersistedSession>, AuthError> {
        Ok(self.slot.read().await.clone())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        *self.slot.write().await = None;
        Ok(())
    }
}

/// Session kept as a small JSON file between runs
pub struct FileSession {
    path: PathBuf,
}

impl FileSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionPersistence for FileSession {
    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError> {
        let body = serde_json::to_vec(session).map_err(|e| AuthError::Session(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Session(e.to_string()))?;
        }
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| AuthError::Session(e.to_string()))?;
        tracing::debug!(path = %self.path.display(), "Session persisted");
        Ok(())
    }

    async fn load(&self) -> Result<Option<PersistedSession>, AuthError> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Session(e.to_string())),
        };
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| AuthError::Session(e.to_string()))
    }

    async fn clear(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Session(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PersistedSession {
        PersistedSession {
            email: "admin@shop.test".to_string(),
            uid: "u-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_session() {
        let store = MemorySession::new();
        assert_eq!(store.load().await.unwrap(), None);
        store.save(&session()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session()));
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_session_stores_only_email_and_uid() {
        let path = std::env::temp_dir()
            .join(format!("shop_admin_session_{}", uuid::Uuid::new_v4()))
            .join("session.json");
        let store = FileSession::new(&path);

        assert_eq!(store.load().await.unwrap(), None);
        store.save(&session()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"email": "admin@shop.test", "uid": "u-1"}));
        assert_eq!(store.load().await.unwrap(), Some(session()));

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("shop_admin_corrupt_{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"not json").await.unwrap();
        let store = FileSession::new(&path);
        assert!(matches!(store.load().await, Err(AuthError::Session(_))));
        store.clear().await.unwrap();
    }
}
