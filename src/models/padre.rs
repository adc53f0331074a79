use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Padre {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ci: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PadreRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "CI is required"))]
    pub ci: String,
}

/// A parent–student tie. It has its own id: links are created from a
/// `(padre_id, estudiante_id)` pair but deleted by this id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PadreEstudiante {
    pub id: i64,
    pub padre_id: i64,
    pub estudiante_id: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub padre: Option<Padre>,
    #[serde(default)]
    pub estudiante: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParentLink {
    pub padre_id: i64,
    pub estudiante_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParentLinkFilter {
    pub padre_id: Option<i64>,
    pub estudiante_id: Option<i64>,
}

impl ParentLinkFilter {
    pub fn for_parent(padre_id: i64) -> Self {
        Self {
            padre_id: Some(padre_id),
            estudiante_id: None,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.padre_id {
            pairs.push(("padre_id", id.to_string()));
        }
        if let Some(id) = self.estudiante_id {
            pairs.push(("estudiante_id", id.to_string()));
        }
        pairs
    }
}
