use serde::{Deserialize, Serialize};
use validator::Validate;

use super::member::Member;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profesor {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ci: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfesorRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "CI is required"))]
    pub ci: String,
}

/// A course as seen from the logged-in teacher (`/profesor/cursos`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfesorCurso {
    pub id: i64,
    #[serde(deserialize_with = "super::string_or_number")]
    pub grade: String,
    pub section: String,
    #[serde(default)]
    pub teacher_id: Option<i64>,
    #[serde(default)]
    pub students_count: u32,
    #[serde(default)]
    pub materias: Vec<Member>,
}

impl ProfesorCurso {
    pub fn label(&self) -> String {
        format!("{}-{}", self.grade, self.section)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfesorCursoDetalle {
    #[serde(flatten)]
    pub curso: ProfesorCurso,
    #[serde(default)]
    pub students: Vec<Member>,
}
