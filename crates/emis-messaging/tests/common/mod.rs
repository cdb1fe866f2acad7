//! In-memory collaborators for exercising the messaging pipeline.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use emis_events::events::{MessageSent, SendMessageRequested, SenderType};
use emis_events::{EventEnvelope, EventError, EventPublisher};
use emis_messaging::{
    ClassReplica, Conversation, ConversationMember, ConversationStore, LastMessage, MemberRole,
    MessageStore, NewMessage, ReplicaStore, StoreError, StoredMessage, UpsertOutcome,
};

/// Message store over a Vec, with an optional fault injector.
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
    next_id: AtomicUsize,
    create_calls: AtomicUsize,
    failures_remaining: Mutex<u32>,
    fail_calls: Mutex<std::collections::HashSet<usize>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` create calls fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock().unwrap() = count;
    }

    /// Make the Nth create call overall (0-based) fail transiently.
    pub fn fail_call(&self, call_index: usize) {
        self.fail_calls.lock().unwrap().insert(call_index);
    }

    pub fn stored(&self) -> Vec<StoredMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn stored_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.lock().unwrap().remove(&call) {
            return Err(StoreError::Unavailable {
                cause: "injected failure".to_string(),
            });
        }
        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::Unavailable {
                    cause: "injected failure".to_string(),
                });
            }
        }

        let id = format!("msg-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let stored = StoredMessage {
            id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            sender_type: message.sender_type,
            content: message.content,
            status: message.status,
            attachments: message.attachments,
            reply_to_message_id: message.reply_to_message_id,
            reply_to_content: message.reply_to_content,
            sent_at: message.sent_at,
        };
        self.messages.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, message_id: &str) -> Result<Option<StoredMessage>, StoreError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == message_id)
            .cloned())
    }
}

/// Conversation store over a HashMap, recording summary updates.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    last_messages: Mutex<HashMap<String, LastMessage>>,
    message_counts: Mutex<HashMap<String, u64>>,
    unread: Mutex<HashMap<(String, String), i64>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conversation: Conversation) {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), conversation);
    }

    pub fn last_message(&self, conversation_id: &str) -> Option<LastMessage> {
        self.last_messages.lock().unwrap().get(conversation_id).cloned()
    }

    pub fn message_count(&self, conversation_id: &str) -> u64 {
        *self
            .message_counts
            .lock()
            .unwrap()
            .get(conversation_id)
            .unwrap_or(&0)
    }

    pub fn unread_count(&self, conversation_id: &str, user_id: &str) -> i64 {
        *self
            .unread
            .lock()
            .unwrap()
            .get(&(conversation_id.to_string(), user_id.to_string()))
            .unwrap_or(&0)
    }

    pub fn member_count(&self, conversation_id: &str) -> usize {
        self.conversations
            .lock()
            .unwrap()
            .get(conversation_id)
            .map_or(0, |c| c.members.len())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned())
    }

    async fn find_class_group(&self, class_id: Uuid) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .values()
            .find(|c| c.class_id == Some(class_id))
            .cloned())
    }

    async fn add_member(
        &self,
        conversation_id: &str,
        member: ConversationMember,
    ) -> Result<bool, StoreError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation =
            conversations
                .get_mut(conversation_id)
                .ok_or_else(|| StoreError::Rejected {
                    cause: format!("unknown conversation {conversation_id}"),
                })?;

        if conversation.member(&member.user_id).is_some() {
            return Ok(false);
        }
        conversation.members.push(member);
        Ok(true)
    }

    async fn update_last_message(
        &self,
        conversation_id: &str,
        last_message: LastMessage,
    ) -> Result<(), StoreError> {
        self.last_messages
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), last_message);
        Ok(())
    }

    async fn increment_message_count(&self, conversation_id: &str) -> Result<(), StoreError> {
        *self
            .message_counts
            .lock()
            .unwrap()
            .entry(conversation_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn increment_unread(
        &self,
        conversation_id: &str,
        user_id: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        *self
            .unread
            .lock()
            .unwrap()
            .entry((conversation_id.to_string(), user_id.to_string()))
            .or_insert(0) += delta;
        Ok(())
    }
}

/// Publisher that records every raw record.
#[derive(Default)]
pub struct RecordingPublisher {
    records: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Decode every record published to the `MessageSent` topic.
    pub fn message_sent_events(&self) -> Vec<EventEnvelope<MessageSent>> {
        use emis_events::Event;
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(topic, _, _)| topic == MessageSent::TOPIC)
            .map(|(_, _, payload)| EventEnvelope::from_json_bytes(payload).unwrap())
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_raw(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        _headers: Vec<(String, String)>,
    ) -> Result<(), EventError> {
        self.records
            .lock()
            .unwrap()
            .push((topic.to_string(), key.to_string(), payload));
        Ok(())
    }
}

/// Replica store enforcing the last-write-wins contract in memory.
#[derive(Default)]
pub struct InMemoryReplicaStore {
    replicas: Mutex<HashMap<Uuid, ClassReplica>>,
}

impl InMemoryReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replica(&self, class_id: Uuid) -> Option<ClassReplica> {
        self.replicas.lock().unwrap().get(&class_id).cloned()
    }
}

#[async_trait]
impl ReplicaStore for InMemoryReplicaStore {
    async fn upsert(&self, replica: ClassReplica) -> Result<UpsertOutcome, StoreError> {
        let mut replicas = self.replicas.lock().unwrap();
        match replicas.get(&replica.class_id) {
            None => {
                replicas.insert(replica.class_id, replica);
                Ok(UpsertOutcome::Inserted)
            }
            Some(existing) if existing.last_synced_at > replica.last_synced_at => {
                Ok(UpsertOutcome::StaleSkipped)
            }
            Some(_) => {
                replicas.insert(replica.class_id, replica);
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    async fn get(&self, class_id: Uuid) -> Result<Option<ClassReplica>, StoreError> {
        Ok(self.replicas.lock().unwrap().get(&class_id).cloned())
    }
}

/// Broadcaster that records group payloads.
#[derive(Default)]
pub struct RecordingBroadcaster {
    broadcasts: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcasts(&self) -> Vec<(String, serde_json::Value)> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl emis_messaging::RealtimeBroadcaster for RecordingBroadcaster {
    async fn broadcast_to_group(
        &self,
        group_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.broadcasts
            .lock()
            .unwrap()
            .push((group_id.to_string(), payload));
        Ok(())
    }
}

/// A member for test conversations.
pub fn member(user_id: &str, name: &str, user_type: SenderType) -> ConversationMember {
    ConversationMember {
        user_id: user_id.to_string(),
        user_name: name.to_string(),
        user_type,
        role: MemberRole::Member,
    }
}

/// A conversation with the given members.
pub fn conversation(id: &str, members: Vec<ConversationMember>) -> Conversation {
    Conversation {
        id: id.to_string(),
        class_id: None,
        members,
    }
}

/// A send request envelope with a sequenced temporary id.
pub fn send_request(n: usize, conversation_id: &str, sender_id: &str) -> EventEnvelope<SendMessageRequested> {
    EventEnvelope::new(SendMessageRequested {
        temporary_message_id: format!("tmp-{n:04}"),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_type: SenderType::Teacher,
        content: format!("message {n}"),
        attachments: vec![],
        reply_to_message_id: None,
        requested_at: Utc::now(),
        correlation_id: None,
    })
}
