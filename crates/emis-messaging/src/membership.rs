//! Conversation membership sync from class assignment events.
//!
//! When a teacher or student is assigned to a class, the message service
//! adds them to the class's group conversation so chat reflects the
//! roster without a synchronous call to the class service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use emis_events::events::{SenderType, StudentAssignedToClass, TeacherAssignedToClass};
use emis_events::{EventEnvelope, EventHandler, HandlerError};

use crate::store::{ConversationMember, ConversationStore, MemberRole};

/// Adds newly assigned teachers/students to their class group
/// conversation. Idempotent: re-adding an existing member is a no-op, so
/// redelivered events are harmless.
pub struct ClassMembershipHandler<C> {
    conversations: Arc<C>,
}

impl<C: ConversationStore> ClassMembershipHandler<C> {
    /// Create a handler over the conversation store.
    pub fn new(conversations: Arc<C>) -> Self {
        Self { conversations }
    }

    async fn add_to_class_group(
        &self,
        class_id: uuid::Uuid,
        member: ConversationMember,
    ) -> Result<(), HandlerError> {
        let Some(group) = self.conversations.find_class_group(class_id).await? else {
            // The group may not exist yet; the assignment event that
            // creates it will carry the roster.
            warn!(class_id = %class_id, "No group conversation for class, skipping");
            return Ok(());
        };

        let user_id = member.user_id.clone();
        let added = self.conversations.add_member(&group.id, member).await?;

        if added {
            info!(
                conversation_id = %group.id,
                user_id = %user_id,
                "Member added to class group"
            );
        } else {
            debug!(
                conversation_id = %group.id,
                user_id = %user_id,
                "Member already in class group"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<C: ConversationStore + 'static> EventHandler<TeacherAssignedToClass>
    for ClassMembershipHandler<C>
{
    async fn handle(
        &self,
        envelope: EventEnvelope<TeacherAssignedToClass>,
    ) -> Result<(), HandlerError> {
        let event = envelope.payload;
        self.add_to_class_group(
            event.class_id,
            ConversationMember {
                user_id: event.teacher_id.to_string(),
                user_name: event.teacher_name,
                user_type: SenderType::Teacher,
                role: if event.is_head_teacher {
                    MemberRole::Admin
                } else {
                    MemberRole::Member
                },
            },
        )
        .await
    }
}

#[async_trait]
impl<C: ConversationStore + 'static> EventHandler<StudentAssignedToClass>
    for ClassMembershipHandler<C>
{
    async fn handle(
        &self,
        envelope: EventEnvelope<StudentAssignedToClass>,
    ) -> Result<(), HandlerError> {
        let event = envelope.payload;
        self.add_to_class_group(
            event.class_id,
            ConversationMember {
                user_id: event.student_id.to_string(),
                user_name: event.student_name,
                user_type: SenderType::Student,
                role: MemberRole::Member,
            },
        )
        .await
    }
}
