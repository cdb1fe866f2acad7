//! Write-behind batch persistence for chat messages.
//!
//! Consumes `SendMessageRequested` events, buffers them, and flushes
//! bounded FIFO batches to durable storage, amortizing many small writes
//! into bulk writes. After each persisted entry the derived `MessageSent`
//! event is published (keyed by conversation for per-conversation
//! ordering) so realtime delivery can proceed with the storage-assigned
//! id.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use emis_events::events::{MessageSent, SendMessageRequested};
use emis_events::{
    EventEnvelope, EventHandler, EventPublisher, EventPublisherExt, HandlerError,
};

use crate::buffer::MessageBuffer;
use crate::error::MessagingError;
use crate::store::{
    ConversationStore, LastMessage, MessageAttachment, MessageStatus, MessageStore, NewMessage,
};

/// Tuning knobs for the batch pipeline.
#[derive(Debug, Clone)]
pub struct WriteBehindConfig {
    /// Maximum entries per flush; reaching it on enqueue triggers a flush.
    pub batch_size: usize,
    /// Elapsed time since the last flush that triggers a flush on the
    /// next enqueue. The [`crate::FlushTicker`] covers the idle case.
    pub flush_interval: std::time::Duration,
}

impl Default for WriteBehindConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: std::time::Duration::from_secs(1),
        }
    }
}

/// Result of one flush attempt.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries durably persisted and announced.
    pub flushed: usize,
    /// Entries dropped as unresolvable (missing conversation or sender).
    pub skipped: usize,
}

/// Handler that buffers `SendMessageRequested` events and bulk-persists
/// them.
///
/// The buffer is shared: clone the `Arc`s and hand the same instance to
/// the consumer registration and the flush ticker.
pub struct MessagePersistence<M, C, P> {
    buffer: Arc<MessageBuffer>,
    messages: Arc<M>,
    conversations: Arc<C>,
    publisher: Arc<P>,
    config: WriteBehindConfig,
}

impl<M, C, P> MessagePersistence<M, C, P>
where
    M: MessageStore,
    C: ConversationStore,
    P: EventPublisher,
{
    /// Create the pipeline over an injected buffer and collaborators.
    pub fn new(
        buffer: Arc<MessageBuffer>,
        messages: Arc<M>,
        conversations: Arc<C>,
        publisher: Arc<P>,
        config: WriteBehindConfig,
    ) -> Self {
        Self {
            buffer,
            messages,
            conversations,
            publisher,
            config,
        }
    }

    /// The shared buffer, for wiring the ticker and for shutdown drains.
    #[must_use]
    pub fn buffer(&self) -> &Arc<MessageBuffer> {
        &self.buffer
    }

    /// Flush up to one batch from the buffer.
    ///
    /// At most one flush runs at a time; if another is in-flight this
    /// returns an empty report and the buffered items stay put. On a
    /// transient failure the failed entry and the batch's unprocessed
    /// remainder are requeued at the buffer head (nothing dequeued is
    /// dropped) and the error propagates so the triggering delivery is
    /// redelivered.
    #[instrument(skip(self), fields(buffered = self.buffer.len()))]
    pub async fn flush(&self) -> Result<FlushReport, MessagingError> {
        let Some(_gate) = self.buffer.try_flush_gate() else {
            // Another flush owns the buffer; nothing to do here.
            return Ok(FlushReport::default());
        };

        let batch = self.buffer.drain(self.config.batch_size);
        if batch.is_empty() {
            return Ok(FlushReport::default());
        }

        info!(count = batch.len(), "Flushing message batch");

        let mut report = FlushReport::default();
        let mut entries = batch.into_iter();

        while let Some(envelope) = entries.next() {
            match self.persist_single(&envelope).await {
                Ok(true) => report.flushed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    // Requeue the failed entry plus everything not yet
                    // attempted, in their original order.
                    let mut unflushed = vec![envelope];
                    unflushed.extend(entries);
                    let requeued = unflushed.len();
                    self.buffer.requeue_front(unflushed);
                    warn!(
                        error = %e,
                        flushed = report.flushed,
                        requeued,
                        "Batch flush failed, remainder requeued"
                    );
                    return Err(e);
                }
            }
        }

        self.buffer.mark_flushed();
        info!(
            flushed = report.flushed,
            skipped = report.skipped,
            "Batch flush completed"
        );

        Ok(report)
    }

    /// Persist one buffered entry.
    ///
    /// Returns `Ok(false)` for benign skips (unresolvable conversation or
    /// sender); transient failures return an error.
    async fn persist_single(
        &self,
        envelope: &EventEnvelope<SendMessageRequested>,
    ) -> Result<bool, MessagingError> {
        let event = &envelope.payload;

        let Some(conversation) = self.conversations.get(&event.conversation_id).await? else {
            warn!(
                conversation_id = %event.conversation_id,
                temporary_message_id = %event.temporary_message_id,
                "Conversation not found, skipping entry"
            );
            return Ok(false);
        };

        let Some(sender) = conversation.member(&event.sender_id) else {
            warn!(
                sender_id = %event.sender_id,
                conversation_id = %event.conversation_id,
                "Sender is not a conversation member, skipping entry"
            );
            return Ok(false);
        };
        let sender_name = sender.user_name.clone();

        // Quote the replied-to message if it still exists
        let reply_to_content = match &event.reply_to_message_id {
            Some(reply_id) => self.messages.get(reply_id).await?.map(|m| m.content),
            None => None,
        };

        let saved = self
            .messages
            .create(NewMessage {
                conversation_id: event.conversation_id.clone(),
                sender_id: event.sender_id.clone(),
                sender_name: sender_name.clone(),
                sender_type: event.sender_type,
                content: event.content.clone(),
                status: MessageStatus::Sent,
                attachments: event
                    .attachments
                    .iter()
                    .map(|a| MessageAttachment {
                        file_name: a.file_name.clone(),
                        file_url: a.file_url.clone(),
                        file_type: a.file_type.clone(),
                        file_size: a.file_size,
                    })
                    .collect(),
                reply_to_message_id: event.reply_to_message_id.clone(),
                reply_to_content,
                sent_at: event.requested_at,
            })
            .await?;

        self.conversations
            .update_last_message(
                &event.conversation_id,
                LastMessage {
                    content: saved.content.clone(),
                    sender_id: saved.sender_id.clone(),
                    sender_name: sender_name.clone(),
                    sent_at: saved.sent_at,
                    has_attachment: !saved.attachments.is_empty(),
                },
            )
            .await?;

        self.conversations
            .increment_message_count(&event.conversation_id)
            .await?;

        for member in conversation
            .members
            .iter()
            .filter(|m| m.user_id != event.sender_id)
        {
            self.conversations
                .increment_unread(&event.conversation_id, &member.user_id, 1)
                .await?;
        }

        debug!(
            temporary_message_id = %event.temporary_message_id,
            message_id = %saved.id,
            "Message persisted"
        );

        let message_data =
            serde_json::to_value(&saved).map_err(|e| MessagingError::Publish {
                cause: e.to_string(),
            })?;

        let sent = MessageSent {
            message_id: saved.id.clone(),
            conversation_id: saved.conversation_id.clone(),
            sender_id: saved.sender_id.clone(),
            sender_name,
            content: saved.content.clone(),
            has_attachment: !saved.attachments.is_empty(),
            attachment_count: saved.attachments.len(),
            reply_to_message_id: saved.reply_to_message_id.clone(),
            sent_at: saved.sent_at,
            message_data,
        };

        // Keyed by conversation so realtime delivery preserves ordering
        self.publisher
            .publish_with_key(&EventEnvelope::new(sent), &saved.conversation_id)
            .await
            .map_err(|e| MessagingError::Publish {
                cause: e.to_string(),
            })?;

        Ok(true)
    }
}

#[async_trait]
impl<M, C, P> EventHandler<SendMessageRequested> for MessagePersistence<M, C, P>
where
    M: MessageStore + 'static,
    C: ConversationStore + 'static,
    P: EventPublisher + 'static,
{
    async fn handle(
        &self,
        envelope: EventEnvelope<SendMessageRequested>,
    ) -> Result<(), HandlerError> {
        debug!(
            temporary_message_id = %envelope.payload.temporary_message_id,
            conversation_id = %envelope.payload.conversation_id,
            "Buffering send request"
        );

        // Redelivery of an already-buffered record appends a duplicate;
        // that is the accepted cost of the at-least-once contract.
        self.buffer.enqueue(envelope);

        let should_flush = self.buffer.len() >= self.config.batch_size
            || self.buffer.last_flush_elapsed() >= self.config.flush_interval;

        if should_flush {
            self.flush().await?;
        }

        Ok(())
    }
}
