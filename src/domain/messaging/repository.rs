use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::metrics::Metrics;
use crate::store::{
    collections, encode, Direction, DocRef, DocumentStore, FieldUpdates, Query, StoreError,
    WriteBatch, SERVER_TIMESTAMP,
};

use super::errors::MessagingError;
use super::value_objects::{conversation_id, Conversation, Message, MessageStatus, MessageType};

// ============================================================================
// Messaging Repository
// ============================================================================
//
// Conversations live in `conversations/{a_b}`; their messages in the
// `conversations/{a_b}/messages` subcollection. Sending writes the message
// and the conversation summary (last message, unread counters) in one batch.
//
// ============================================================================

pub struct MessagingRepository {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
}

impl MessagingRepository {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Id of the conversation between two users, creating it on first contact
    pub async fn get_or_create_conversation(
        &self,
        current_user: &str,
        other_user: &str,
    ) -> Result<String, MessagingError> {
        if current_user.trim().is_empty() || other_user.trim().is_empty() {
            return Err(MessagingError::Validation("participant ids are required".to_string()));
        }
        if current_user == other_user {
            return Err(MessagingError::Validation(
                "cannot open a conversation with yourself".to_string(),
            ));
        }

        self.metrics
            .observe("get_or_create_conversation", async move {
                let id = conversation_id(current_user, other_user);
                let doc = conversation_ref(&id);
                if self.store.get(&doc).await?.is_some() {
                    return Ok(id);
                }

                let mut unread = Map::new();
                unread.insert(current_user.to_string(), Value::from(0));
                unread.insert(other_user.to_string(), Value::from(0));
                let data = encode(&json!({
                    "participants": [current_user, other_user],
                    "lastMessage": "",
                    "lastMessageTime": SERVER_TIMESTAMP,
                    "unreadCount": unread,
                    "createdAt": SERVER_TIMESTAMP,
                    "updatedAt": SERVER_TIMESTAMP,
                }))?;
                let mut batch = WriteBatch::new();
                batch.create(doc, data);

                match self.store.commit(batch).await {
                    Ok(_) => tracing::info!(conversation_id = %id, "Conversation created"),
                    // The other participant opened it first
                    Err(StoreError::AlreadyExists(_)) => {
                        tracing::debug!(conversation_id = %id, "Conversation already created")
                    }
                    Err(e) => return Err(e.into()),
                }
                Ok::<_, MessagingError>(id)
            })
            .await
    }

    /// Store a message and update the conversation summary atomically.
    /// Returns the new message id.
    pub async fn send_message(
        &self,
        conversation: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<String, MessagingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MessagingError::Validation("message text is empty".to_string()));
        }

        self.metrics
            .observe("send_message", async move {
                let summary = self.load_conversation(conversation).await?;
                if !summary.has_participant(sender_id) {
                    return Err(MessagingError::NotParticipant {
                        conversation: conversation.to_string(),
                        user: sender_id.to_string(),
                    });
                }

                let message_id = self.store.new_id();
                let message = encode(&json!({
                    "senderId": sender_id,
                    "text": text,
                    "type": MessageType::Text,
                    "status": MessageStatus::Sent,
                    "read": false,
                    "deletedFor": [],
                    "createdAt": SERVER_TIMESTAMP,
                    "updatedAt": SERVER_TIMESTAMP,
                }))?;

                let mut counters = FieldUpdates::new()
                    .set("lastMessage", text)
                    .server_timestamp("lastMessageTime")
                    .server_timestamp("updatedAt")
                    .set(&unread_path(sender_id), 0);
                for other in summary.other_participants(sender_id) {
                    counters = counters.increment(&unread_path(other), 1);
                }

                let mut batch = WriteBatch::new();
                batch
                    .create(message_ref(conversation, &message_id), message)
                    .update(conversation_ref(conversation), counters);
                self.store.commit(batch).await?;

                self.metrics.messages_sent.inc();
                tracing::info!(conversation_id = conversation, message_id = %message_id, "Message sent");
                Ok::<_, MessagingError>(message_id)
            })
            .await
    }

    /// Mark every unread message from the other side as read and reset the
    /// user's unread counter. Returns how many messages changed.
    pub async fn mark_messages_as_read(
        &self,
        conversation: &str,
        user_id: &str,
    ) -> Result<usize, MessagingError> {
        self.metrics
            .observe("mark_messages_as_read", async move {
                let unread = self
                    .store
                    .query(
                        &Query::collection(collections::messages(conversation))
                            .where_eq("read", false)
                            .where_ne("senderId", user_id),
                    )
                    .await?;

                let mut batch = WriteBatch::new();
                for message in &unread {
                    batch.update(
                        message_ref(conversation, &message.id),
                        FieldUpdates::new()
                            .set("read", true)
                            .set("status", "read"),
                    );
                }
                batch.update(
                    conversation_ref(conversation),
                    FieldUpdates::new()
                        .set(&unread_path(user_id), 0)
                        .server_timestamp("updatedAt"),
                );
                self.store.commit(batch).await?;

                tracing::debug!(conversation_id = conversation, user_id, marked = unread.len(), "Messages marked read");
                Ok::<_, MessagingError>(unread.len())
            })
            .await
    }

    /// Hide a message for one user; the other participant still sees it
    pub async fn delete_message(
        &self,
        conversation: &str,
        message_id: &str,
        user_id: &str,
    ) -> Result<(), MessagingError> {
        self.metrics
            .observe("delete_message", async move {
                let mut batch = WriteBatch::new();
                batch.update(
                    message_ref(conversation, message_id),
                    FieldUpdates::new().array_union("deletedFor", vec![Value::from(user_id)]),
                );
                self.store.commit(batch).await?;

                tracing::info!(conversation_id = conversation, message_id, user_id, "Message deleted for user");
                Ok::<_, MessagingError>(())
            })
            .await
    }

    /// Conversations the user takes part in, most recent activity first
    pub async fn user_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, MessagingError> {
        self.metrics
            .observe("user_conversations", async move {
                let query = Query::collection(collections::CONVERSATIONS)
                    .array_contains("participants", user_id)
                    .order_by("lastMessageTime", Direction::Desc);
                let conversations = self
                    .store
                    .query(&query)
                    .await?
                    .iter()
                    .map(|doc| doc.decode::<Conversation>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, MessagingError>(conversations)
            })
            .await
    }

    /// Messages in sending order, minus the ones the user deleted
    pub async fn conversation_messages(
        &self,
        conversation: &str,
        user_id: &str,
    ) -> Result<Vec<Message>, MessagingError> {
        self.metrics
            .observe("conversation_messages", async move {
                let query = Query::collection(collections::messages(conversation))
                    .order_by("createdAt", Direction::Asc);
                let messages = self
                    .store
                    .query(&query)
                    .await?
                    .iter()
                    .map(|doc| doc.decode::<Message>())
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|message| !message.is_deleted_for(user_id))
                    .collect();
                Ok::<_, MessagingError>(messages)
            })
            .await
    }

    async fn load_conversation(&self, conversation: &str) -> Result<Conversation, MessagingError> {
        let document = self
            .store
            .get(&conversation_ref(conversation))
            .await?
            .ok_or_else(|| MessagingError::NotFound(format!("conversation {}", conversation)))?;
        Ok(document.decode::<Conversation>()?)
    }
}

fn conversation_ref(conversation: &str) -> DocRef {
    DocRef::new(collections::CONVERSATIONS, conversation)
}

fn message_ref(conversation: &str, message_id: &str) -> DocRef {
    DocRef::new(collections::messages(conversation), message_id)
}

fn unread_path(user_id: &str) -> String {
    format!("unreadCount.{}", user_id)
}
