//! Chat messaging events.
//!
//! `SendMessageRequested` is published by the write API before anything
//! touches durable storage (write-behind); `MessageSent` is the derived
//! event published after bulk persistence, carrying the storage-assigned
//! id, and drives realtime delivery.

use crate::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of user sending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SenderType {
    Teacher,
    Student,
    Parent,
}

/// Attachment metadata carried in the event, before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttachmentData {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
}

/// Published when a client requests sending a message.
///
/// Accepted by the write API in ~1-2 ms (one broker publish); the
/// consumer-side batch pipeline performs the durable write later. The
/// temporary id tracks the message until storage assigns the real one.
///
/// Published keyed by `conversation_id` so messages within one
/// conversation stay ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequested {
    /// Client- or API-generated id, superseded by the storage-assigned id
    /// once the flush persists the message.
    pub temporary_message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_type: SenderType,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<MessageAttachmentData>,
    /// Message being replied to, if any.
    pub reply_to_message_id: Option<String>,
    /// When the write API accepted the request.
    pub requested_at: DateTime<Utc>,
    /// Correlation id tracking the request from client through storage.
    pub correlation_id: Option<String>,
}

impl Event for SendMessageRequested {
    const TOPIC: &'static str = "emis.message.send.requested";
    const EVENT_TYPE: &'static str = "emis.message.send.requested";
}

/// Published after a message has been durably persisted.
///
/// Downstream realtime delivery broadcasts `message_data` to the
/// conversation's group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSent {
    /// Storage-assigned message id.
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub has_attachment: bool,
    pub attachment_count: usize,
    pub reply_to_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    /// Full message DTO for the realtime broadcast.
    pub message_data: serde_json::Value,
}

impl Event for MessageSent {
    const TOPIC: &'static str = "emis.message.sent";
    const EVENT_TYPE: &'static str = "emis.message.sent";
}
