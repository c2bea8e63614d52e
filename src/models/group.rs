//! Group and roster data structures.

use serde::{Deserialize, Serialize};

/// Institution used when the page does not name one.
pub const DEFAULT_INSTITUTION: &str = "КОЛЛЕДЖ";

/// Form of study used when the page does not name one.
pub const DEFAULT_FORM_TRAINING: &str = "очная";

/// A student row from a group roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Position in the roster (not unique across groups)
    pub number: u32,

    /// Full name
    pub name: String,

    /// Enrollment status code
    pub status: String,

    /// Portal person identifier, empty when the row has no link
    pub person_id: String,
}

/// A student group with its metadata and roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    /// Portal group number
    pub number: u32,

    /// Always `students.len()`
    pub count_student: usize,

    pub year_receipt: u32,

    /// 1-5, or 0 when undetermined
    pub course: u32,

    pub direction: String,
    pub profile: String,
    pub institution: String,
    pub form_training: String,
    pub students: Vec<Student>,
}

impl GroupRecord {
    /// Whether the record carries at least one student.
    pub fn has_students(&self) -> bool {
        !self.students.is_empty()
    }
}
