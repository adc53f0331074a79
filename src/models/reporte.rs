use serde::{Deserialize, Serialize};
use validator::Validate;

/// A disciplinary report filed by a teacher about a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub student_id: i64,
    pub teacher_id: i64,
    pub category_id: i64,
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub student: Option<serde_json::Value>,
    #[serde(default)]
    pub teacher: Option<serde_json::Value>,
    #[serde(default)]
    pub category: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReportRequest {
    pub student_id: i64,
    pub teacher_id: i64,
    pub category_id: i64,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReportCategoryRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
