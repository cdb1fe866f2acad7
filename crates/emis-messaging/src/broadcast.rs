//! Realtime delivery of persisted messages.
//!
//! Consumes `MessageSent` (published by the flush routine with the
//! storage-assigned id) and hands the finished payload to the realtime
//! fan-out transport, grouped by conversation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use emis_events::events::MessageSent;
use emis_events::{EventEnvelope, EventHandler, HandlerError};

use crate::error::MessagingError;
use crate::store::RealtimeBroadcaster;

/// Broadcasts persisted messages to their conversation's group.
pub struct MessageBroadcastHandler<B> {
    broadcaster: Arc<B>,
}

impl<B: RealtimeBroadcaster> MessageBroadcastHandler<B> {
    /// Create a handler over the fan-out transport.
    pub fn new(broadcaster: Arc<B>) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl<B: RealtimeBroadcaster + 'static> EventHandler<MessageSent> for MessageBroadcastHandler<B> {
    async fn handle(&self, envelope: EventEnvelope<MessageSent>) -> Result<(), HandlerError> {
        let event = envelope.payload;

        debug!(
            message_id = %event.message_id,
            conversation_id = %event.conversation_id,
            "Broadcasting message"
        );

        if let Err(e) = self
            .broadcaster
            .broadcast_to_group(&event.conversation_id, event.message_data.clone())
            .await
        {
            error!(
                message_id = %event.message_id,
                conversation_id = %event.conversation_id,
                error = %e,
                "Broadcast failed, delivery will be retried"
            );
            return Err(MessagingError::Broadcast {
                group_id: event.conversation_id,
                cause: e.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
