use super::errors::MessagingError;
use super::repository::MessagingRepository;
use super::value_objects::{Conversation, Message};
use crate::state::{track, RequestState};

// ============================================================================
// Message State - Conversation list and the open thread
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MessageState {
    pub conversations: Vec<Conversation>,
    pub current_conversation: Option<String>,
    pub messages: Vec<Message>,
    pub request: RequestState,
}

impl MessageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_current_conversation(&mut self) {
        self.current_conversation = None;
        self.messages.clear();
    }

    /// Total unread messages for the user across all conversations
    pub fn unread_total(&self, user_id: &str) -> i64 {
        self.conversations.iter().map(|c| c.unread_for(user_id)).sum()
    }

    pub async fn load_conversations(
        &mut self,
        repo: &MessagingRepository,
        user_id: &str,
    ) -> Result<(), MessagingError> {
        self.conversations = track(&mut self.request, repo.user_conversations(user_id)).await?;
        Ok(())
    }

    /// Open (or start) the conversation with another user, load its thread
    /// and mark what the other side sent as read
    pub async fn open_conversation(
        &mut self,
        repo: &MessagingRepository,
        user_id: &str,
        other_user: &str,
    ) -> Result<(), MessagingError> {
        let operation = async {
            let id = repo.get_or_create_conversation(user_id, other_user).await?;
            repo.mark_messages_as_read(&id, user_id).await?;
            let messages = repo.conversation_messages(&id, user_id).await?;
            Ok::<_, MessagingError>((id, messages))
        };
        let (id, messages) = track(&mut self.request, operation).await?;

        for conversation in self.conversations.iter_mut().filter(|c| c.id == id) {
            conversation.unread_count.insert(user_id.to_string(), 0);
        }
        self.current_conversation = Some(id);
        self.messages = messages;
        Ok(())
    }

    /// Send into the open conversation and reload its thread
    pub async fn send(
        &mut self,
        repo: &MessagingRepository,
        user_id: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        let conversation = self.open_id()?;
        let operation = async {
            repo.send_message(&conversation, user_id, text).await?;
            repo.conversation_messages(&conversation, user_id).await
        };
        self.messages = track(&mut self.request, operation).await?;
        Ok(())
    }

    pub async fn delete(
        &mut self,
        repo: &MessagingRepository,
        user_id: &str,
        message_id: &str,
    ) -> Result<(), MessagingError> {
        let conversation = self.open_id()?;
        track(&mut self.request, repo.delete_message(&conversation, message_id, user_id)).await?;
        self.messages.retain(|message| message.id != message_id);
        Ok(())
    }

    fn open_id(&mut self) -> Result<String, MessagingError> {
        match &self.current_conversation {
            Some(id) => Ok(id.clone()),
            None => {
                let err = MessagingError::Validation("no conversation is open".to_string());
                self.request.rejected(&err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    fn repo() -> MessagingRepository {
        MessagingRepository::new(Arc::new(InMemoryStore::new()), Arc::new(Metrics::new().unwrap()))
    }

    #[tokio::test]
    async fn test_open_send_and_delete() {
        let repo = repo();
        let mut admin = MessageState::new();

        admin.open_conversation(&repo, "admin", "ann").await.unwrap();
        assert_eq!(admin.current_conversation.as_deref(), Some("admin_ann"));
        assert!(admin.messages.is_empty());

        admin.send(&repo, "admin", "Hello Ann").await.unwrap();
        assert_eq!(admin.messages.len(), 1);

        let message_id = admin.messages[0].id.clone();
        admin.delete(&repo, "admin", &message_id).await.unwrap();
        assert!(admin.messages.is_empty());

        admin.clear_current_conversation();
        assert!(admin.current_conversation.is_none());
    }

    #[tokio::test]
    async fn test_opening_marks_read() {
        let repo = repo();
        let mut ann = MessageState::new();
        ann.open_conversation(&repo, "ann", "admin").await.unwrap();
        ann.send(&repo, "ann", "Is my order on the way?").await.unwrap();

        let mut admin = MessageState::new();
        admin.load_conversations(&repo, "admin").await.unwrap();
        assert_eq!(admin.unread_total("admin"), 1);

        admin.open_conversation(&repo, "admin", "ann").await.unwrap();
        assert_eq!(admin.unread_total("admin"), 0);
        assert!(admin.messages.iter().all(|m| m.read));

        admin.load_conversations(&repo, "admin").await.unwrap();
        assert_eq!(admin.unread_total("admin"), 0);
    }

    #[tokio::test]
    async fn test_send_without_open_conversation() {
        let repo = repo();
        let mut state = MessageState::new();
        let err = state.send(&repo, "admin", "hi").await.unwrap_err();
        assert!(matches!(err, MessagingError::Validation(_)));
        assert!(state.request.error.is_some());
    }
}
