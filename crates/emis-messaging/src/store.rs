//! Downstream collaborator interfaces.
//!
//! The messaging core consumes these; implementations live with the
//! owning services (the message store is a document database in
//! production, the broadcaster is the realtime hub). Lookups return
//! `Ok(None)` for absent entities — that is a benign condition handlers
//! downgrade to a logged skip — while infrastructure failures surface as
//! `StoreError` and propagate so the broker redelivers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use emis_events::events::SenderType;

/// Errors from a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or the operation timed out.
    #[error("Storage unavailable: {cause}")]
    Unavailable { cause: String },

    /// The store rejected the operation.
    #[error("Storage rejected operation: {cause}")]
    Rejected { cause: String },
}

impl StoreError {
    /// Returns true if retrying may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Role of a conversation member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

/// Delivery status of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// A member of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMember {
    pub user_id: String,
    pub user_name: String,
    pub user_type: SenderType,
    pub role: MemberRole,
}

/// A conversation, as much of it as the messaging core needs.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    /// Class backing a class-group conversation, if any.
    pub class_id: Option<Uuid>,
    pub members: Vec<ConversationMember>,
}

impl Conversation {
    /// Find a member by user id.
    #[must_use]
    pub fn member(&self, user_id: &str) -> Option<&ConversationMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

/// Summary of the newest message, denormalized onto the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sent_at: DateTime<Utc>,
    pub has_attachment: bool,
}

/// A stored attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
}

/// A message ready to persist; storage assigns the id.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_type: SenderType,
    pub content: String,
    pub status: MessageStatus,
    pub attachments: Vec<MessageAttachment>,
    pub reply_to_message_id: Option<String>,
    pub reply_to_content: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// A durably persisted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Storage-assigned identifier.
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_type: SenderType,
    pub content: String,
    pub status: MessageStatus,
    pub attachments: Vec<MessageAttachment>,
    pub reply_to_message_id: Option<String>,
    pub reply_to_content: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Durable message storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return it with its storage-assigned id.
    async fn create(&self, message: NewMessage) -> Result<StoredMessage, StoreError>;

    /// Fetch a message by id (used for reply quoting).
    async fn get(&self, message_id: &str) -> Result<Option<StoredMessage>, StoreError>;
}

/// Conversation metadata storage, including membership resolution.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch a conversation with its member list.
    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Find the group conversation backed by a class.
    async fn find_class_group(&self, class_id: Uuid) -> Result<Option<Conversation>, StoreError>;

    /// Add a member to a conversation. Returns false if the user was
    /// already a member (the call is idempotent).
    async fn add_member(
        &self,
        conversation_id: &str,
        member: ConversationMember,
    ) -> Result<bool, StoreError>;

    /// Replace the conversation's last-message summary.
    async fn update_last_message(
        &self,
        conversation_id: &str,
        last_message: LastMessage,
    ) -> Result<(), StoreError>;

    /// Bump the conversation's total message count.
    async fn increment_message_count(&self, conversation_id: &str) -> Result<(), StoreError>;

    /// Adjust a member's unread counter.
    async fn increment_unread(
        &self,
        conversation_id: &str,
        user_id: &str,
        delta: i64,
    ) -> Result<(), StoreError>;
}

/// Realtime fan-out transport. The messaging core only hands it a
/// finished payload; connection management lives elsewhere.
#[async_trait]
pub trait RealtimeBroadcaster: Send + Sync {
    /// Broadcast a payload to every client joined to a group.
    async fn broadcast_to_group(
        &self,
        group_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError>;
}
