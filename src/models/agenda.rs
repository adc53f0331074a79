use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaScope {
    Global,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgendaStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaEvent {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Local date and time, e.g. `2024-03-20T14:00:00`.
    pub scheduled_at: String,
    #[serde(rename = "type", default)]
    pub scope: Option<AgendaScope>,
    #[serde(default)]
    pub paralelo: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub participants: Option<u32>,
    #[serde(default)]
    pub status: AgendaStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub reminders: bool,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub recurring_type: Option<Recurrence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AgendaRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paralelo_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Date and time are required"))]
    pub scheduled_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgendaFilter {
    pub paralelo_id: Option<i64>,
    pub grade: Option<String>,
}

impl AgendaFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.paralelo_id {
            pairs.push(("paralelo_id", id.to_string()));
        }
        if let Some(grade) = &self.grade {
            pairs.push(("grade", grade.clone()));
        }
        pairs
    }
}
