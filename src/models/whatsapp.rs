use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Academic,
    Administrative,
    Emergency,
    Event,
    Reminder,
    #[default]
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    Active,
    Inactive,
    #[default]
    Draft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    Parents,
    Teachers,
    Students,
    #[default]
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppTemplate {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub category: TemplateCategory,
    #[serde(default)]
    pub status: TemplateStatus,
    #[serde(default)]
    pub target_audience: TargetAudience,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub has_attachment: bool,
    #[serde(default)]
    pub is_schedulable: bool,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub last_used: Option<String>,
    #[serde(default)]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl WhatsAppTemplate {
    /// Substitutes every `{variable}` of the template in one pass, so braces
    /// inside a value are left as written. Variables without a value render as
    /// `[variable]` so a preview shows what is missing.
    pub fn render(&self, values: &BTreeMap<String, String>) -> String {
        let mut rendered = String::with_capacity(self.message.len());
        let mut rest = self.message.as_str();
        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}').map(|end| (&after[..end], end)) {
                Some((name, end)) if is_variable_name(name) => {
                    match values.get(name) {
                        Some(value) => rendered.push_str(value),
                        None => {
                            rendered.push('[');
                            rendered.push_str(name);
                            rendered.push(']');
                        }
                    }
                    rest = &after[end + 1..];
                }
                _ => {
                    rendered.push('{');
                    rest = after;
                }
            }
        }
        rendered.push_str(rest);
        rendered
    }
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Names between single braces, in order of first appearance.
pub fn extract_variables(message: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut rest = message;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        let name = &after[..end];
        let valid = is_variable_name(name);
        if valid && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
        rest = if valid { &after[end + 1..] } else { after };
    }
    out
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct WhatsAppTemplateRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub subject: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TemplateCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TemplateStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<TargetAudience>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_attachment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_schedulable: Option<bool>,
    pub created_by: i64,
}

impl WhatsAppTemplateRequest {
    /// Fills `variables` from the message when the caller left it empty.
    pub fn with_detected_variables(mut self) -> Self {
        if self.variables.as_ref().is_none_or(|v| v.is_empty()) {
            self.variables = Some(extract_variables(&self.message));
        }
        self
    }
}
