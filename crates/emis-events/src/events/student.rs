//! Student and parent lifecycle events.

use crate::event::Event;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published when a new student is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCreated {
    /// Student's unique identifier.
    pub student_id: Uuid,
    /// Full name.
    pub full_name: String,
    /// Email address (may be absent for young students).
    pub email: Option<String>,
    /// Phone number.
    pub phone_number: Option<String>,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Grade level.
    pub grade: Option<String>,
    /// Class name.
    pub class_name: Option<String>,
    /// Initial password, hashed before storage by the consumer.
    pub default_password: String,
    /// School ID.
    pub school_id: Option<Uuid>,
}

impl Event for StudentCreated {
    const TOPIC: &'static str = "emis.student.created";
    const EVENT_TYPE: &'static str = "emis.student.created";
}

/// Published when a new parent is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentCreated {
    /// Parent's unique identifier.
    pub parent_id: Uuid,
    /// Full name.
    pub full_name: String,
    /// Email address (used as the account username).
    pub email: String,
    /// Phone number.
    pub phone_number: String,
    /// Date of birth.
    pub date_of_birth: Option<NaiveDate>,
    /// Initial password, hashed before storage by the consumer.
    pub default_password: String,
    /// Students this parent is associated with.
    #[serde(default)]
    pub student_ids: Vec<Uuid>,
}

impl Event for ParentCreated {
    const TOPIC: &'static str = "emis.parent.created";
    const EVENT_TYPE: &'static str = "emis.parent.created";
}

/// Published when a student is assigned to a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignedToClass {
    pub student_id: Uuid,
    pub class_id: Uuid,
    pub student_name: String,
    pub class_name: String,
    /// Parents to include in the student's group conversation.
    #[serde(default)]
    pub parent_ids: Vec<Uuid>,
    /// Teachers already assigned to the class.
    #[serde(default)]
    pub teacher_ids: Vec<Uuid>,
}

impl Event for StudentAssignedToClass {
    const TOPIC: &'static str = "emis.student.class.assigned";
    const EVENT_TYPE: &'static str = "emis.student.class.assigned";
}
