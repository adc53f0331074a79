use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Live channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Body the backend returns with 4xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl AppError {
    /// Builds the error for a non-success response from its status and raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            404 => AppError::NotFound,
            409 => AppError::Conflict(message),
            422 => AppError::Validation {
                message,
                fields: parsed.errors,
            },
            _ => AppError::Api { status, message },
        }
    }

    /// Transport failures may succeed when re-issued; backend rejections will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Http(_) | AppError::Channel(_) => true,
            AppError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// First per-field message of a validation error, for single-line display.
    pub fn first_field_message(&self) -> Option<&str> {
        match self {
            AppError::Validation { fields, .. } => fields
                .values()
                .find_map(|msgs| msgs.first())
                .map(String::as_str),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }

        let message = if fields.len() == 1 {
            fields
                .values()
                .next()
                .and_then(|m| m.first().cloned())
                .unwrap_or_default()
        } else {
            format!("{} invalid fields", fields.len())
        };

        AppError::Validation { message, fields }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Channel(err.to_string())
    }
}
