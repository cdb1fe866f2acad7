//! Built-in event types for the EMIS services.
//!
//! This module provides the standard contract events exchanged between
//! services:
//! - Teacher lifecycle events (created, assigned to class)
//! - Student/parent lifecycle events (created, assigned to class)
//! - Class events (created, updated) consumed by replica synchronizers
//! - Messaging events (send requested, sent) driving the write-behind
//!   persistence pipeline and realtime delivery

pub mod class;
pub mod messaging;
pub mod student;
pub mod teacher;

// Re-export all events for convenience
pub use class::{ClassCreated, ClassUpdated};
pub use messaging::{MessageAttachmentData, MessageSent, SendMessageRequested, SenderType};
pub use student::{ParentCreated, StudentAssignedToClass, StudentCreated};
pub use teacher::{TeacherAssignedToClass, TeacherCreated};
