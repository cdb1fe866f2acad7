//! Class lifecycle events.
//!
//! Published by the class service; other services subscribe to keep a
//! local replica of class information in sync.

use crate::event::Event;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published when a new class is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCreated {
    /// The new class's ID.
    pub class_id: Uuid,
    /// Class display name.
    pub class_name: String,
    /// Grade level, e.g. "10".
    pub grade: Option<String>,
    /// Academic year, e.g. "2025-2026".
    pub academic_year: Option<String>,
    /// Current enrolled student count.
    pub total_students: Option<i32>,
    /// School the class belongs to.
    pub school_id: Option<Uuid>,
    /// Homeroom teacher, if already assigned.
    pub homeroom_teacher_id: Option<Uuid>,
}

impl Event for ClassCreated {
    const TOPIC: &'static str = "emis.class.created";
    const EVENT_TYPE: &'static str = "emis.class.created";
}

/// Published when class information changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassUpdated {
    /// The updated class's ID.
    pub class_id: Uuid,
    /// Class display name.
    pub class_name: String,
    /// Grade level.
    pub grade: Option<String>,
    /// Academic year.
    pub academic_year: Option<String>,
    /// Current enrolled student count.
    pub total_students: Option<i32>,
    /// School the class belongs to.
    pub school_id: Option<Uuid>,
    /// Homeroom teacher, if assigned.
    pub homeroom_teacher_id: Option<Uuid>,
}

impl Event for ClassUpdated {
    const TOPIC: &'static str = "emis.class.updated";
    const EVENT_TYPE: &'static str = "emis.class.updated";
}
