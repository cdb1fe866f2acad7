//! Teacher lifecycle events.

use crate::event::Event;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published when a new teacher is created.
///
/// Consumed by several services: the auth service provisions a user
/// account, the notification service sends a welcome message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherCreated {
    /// Teacher's unique identifier.
    pub teacher_id: Uuid,
    /// Full name.
    pub full_name: String,
    /// Email address (used as the account username).
    pub email: String,
    /// Phone number (username fallback when email is empty).
    pub phone_number: Option<String>,
    /// Subject taught.
    pub subject: Option<String>,
    /// Date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Initial password, hashed before storage by the consumer.
    pub default_password: String,
    /// School or organization ID.
    pub school_id: Option<Uuid>,
}

impl Event for TeacherCreated {
    const TOPIC: &'static str = "emis.teacher.created";
    const EVENT_TYPE: &'static str = "emis.teacher.created";
}

/// Published when a teacher is assigned to a class.
///
/// The message service adds the teacher to the class's group
/// conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssignedToClass {
    pub teacher_id: Uuid,
    pub class_id: Uuid,
    pub teacher_name: String,
    pub class_name: String,
    /// Whether this assignment makes the teacher the homeroom teacher.
    pub is_head_teacher: bool,
}

impl Event for TeacherAssignedToClass {
    const TOPIC: &'static str = "emis.teacher.class.assigned";
    const EVENT_TYPE: &'static str = "emis.teacher.class.assigned";
}
