use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Messaging Value Objects
// ============================================================================

/// Deterministic id shared by both participants: the two user ids, sorted,
/// joined with `_`
pub fn conversation_id(user_a: &str, user_b: &str) -> String {
    let mut ids = [user_a, user_b];
    ids.sort_unstable();
    ids.join("_")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub sender_id: String,
    pub text: String,
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub deleted_for: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_deleted_for(&self, user_id: &str) -> bool {
        self.deleted_for.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(default)]
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: BTreeMap<String, i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn unread_for(&self, user_id: &str) -> i64 {
        self.unread_count.get(user_id).copied().unwrap_or(0)
    }

    pub fn other_participants<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.participants
            .iter()
            .map(String::as_str)
            .filter(move |id| *id != user_id)
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }
}
