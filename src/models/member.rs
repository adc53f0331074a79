use serde::{Deserialize, Serialize};
use serde_json::json;

pub type GroupId = i64;
pub type MemberId = i64;

/// The part of a student or subject that membership logic cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(default)]
    pub name: String,
}

impl Member {
    pub fn new(id: MemberId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Which many-to-many relation of a paralelo is being managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Students,
    Subjects,
}

impl Relation {
    /// Top-level collection holding every member of this kind.
    pub fn roster_path(&self) -> &'static str {
        match self {
            Relation::Students => "/estudiantes",
            Relation::Subjects => "/materias",
        }
    }

    /// Nested segment under `/paralelos/{id}`.
    pub fn segment(&self) -> &'static str {
        match self {
            Relation::Students => "estudiantes",
            Relation::Subjects => "materias",
        }
    }

    /// A student sits in one paralelo at a time; a subject is taught in many.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Relation::Students)
    }

    pub fn attach_body(&self, member_id: MemberId) -> serde_json::Value {
        match self {
            Relation::Students => json!({ "student_id": member_id }),
            Relation::Subjects => json!({ "materia_id": member_id }),
        }
    }

    pub fn sync_body(&self, member_ids: &[MemberId]) -> serde_json::Value {
        match self {
            Relation::Students => json!({ "student_ids": member_ids }),
            Relation::Subjects => json!({ "materia_ids": member_ids }),
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.segment())
    }
}
