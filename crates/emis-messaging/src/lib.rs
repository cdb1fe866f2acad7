//! # emis-messaging
//!
//! Consumer-side messaging components for the EMIS services.
//!
//! ## Write-behind persistence
//!
//! The write API acknowledges a chat message by publishing a
//! `SendMessageRequested` event (~1-2 ms) instead of writing storage
//! inline. This crate's [`MessagePersistence`] handler accumulates those
//! events in an explicit, injected [`MessageBuffer`] and flushes them as
//! bounded FIFO batches: resolve denormalized fields, write the durable
//! record, update the conversation summary and unread counters, then
//! publish the derived `MessageSent` event for realtime delivery.
//!
//! Flushes trigger opportunistically on the enqueue path (batch size or
//! elapsed interval) and on a fixed cadence via [`FlushTicker`], which
//! also drains the buffer on shutdown. At most one flush runs at a time;
//! a concurrent attempt is a silent no-op.
//!
//! ## Local replicas
//!
//! [`ClassReplicaSynchronizer`] keeps a denormalized copy of class
//! metadata fresh from `ClassCreated`/`ClassUpdated` events. Upserts are
//! idempotent and last-write-wins by event timestamp, so replays and
//! out-of-order delivery converge.
//!
//! ## Cargo Features
//!
//! - `postgres`: sqlx-backed [`PgReplicaStore`]

pub mod broadcast;
pub mod buffer;
pub mod error;
pub mod membership;
pub mod replica;
pub mod store;
pub mod ticker;
pub mod write_behind;

#[cfg(feature = "postgres")]
pub mod replica_pg;

pub use broadcast::MessageBroadcastHandler;
pub use buffer::MessageBuffer;
pub use error::MessagingError;
pub use membership::ClassMembershipHandler;
pub use replica::{ClassReplica, ClassReplicaSynchronizer, ReplicaStore, UpsertOutcome};
pub use store::{
    Conversation, ConversationMember, ConversationStore, LastMessage, MemberRole,
    MessageAttachment, MessageStatus, MessageStore, NewMessage, RealtimeBroadcaster, StoreError,
    StoredMessage,
};
pub use ticker::FlushTicker;
pub use write_behind::{FlushReport, MessagePersistence, WriteBehindConfig};

#[cfg(feature = "postgres")]
pub use replica_pg::PgReplicaStore;
