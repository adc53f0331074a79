use serde::{Deserialize, Serialize};
use validator::Validate;

use super::profesor::Profesor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paralelo {
    pub id: i64,
    #[serde(deserialize_with = "super::string_or_number")]
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub teacher_id: Option<i64>,
    #[serde(default)]
    pub teacher: Option<Profesor>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Paralelo {
    /// Display label, e.g. `3-A`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.grade, self.section)
    }

    pub fn teacher_name(&self) -> Option<&str> {
        self.teacher.as_ref().map(|t| t.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParaleloRequest {
    #[validate(length(min = 1, message = "Grade is required"))]
    pub grade: String,
    #[validate(length(min = 1, message = "Section is required"))]
    pub section: String,
    pub teacher_id: i64,
}
