//! # Error Handling
//!
//! Client-side error taxonomy for list fetches and mutations against the
//! affiliate REST API. Every variant is `Clone` so a single failed network call
//! can be handed to every caller that joined the same in-flight request.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::query::Collection;

/// Per-field validation messages returned by the API.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Coarse classification used by callers to decide how to surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request never reached the server or timed out
    Network,
    /// Session could not be refreshed; the user is signed out
    Authentication,
    /// 4xx other than 401; shown inline at the initiating form or dialog
    Validation,
    /// 5xx from the API
    Server,
    /// Response body did not have the expected shape
    Decode,
    /// A mutation for the same entity is already pending
    Conflict,
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("could not reach the API: {message}")]
    Transport { message: String },

    #[error("session expired: {message}")]
    Unauthorized { message: String },

    #[error("request rejected with status {status}: {message}")]
    Validation {
        status: u16,
        message: String,
        field_errors: FieldErrors,
    },

    #[error("API server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response body: {message}")]
    Decode { message: String },

    #[error("a mutation for {collection}/{entity_id} is already in flight")]
    MutationInFlight {
        collection: Collection,
        entity_id: String,
    },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport { .. } => ErrorKind::Network,
            ClientError::Unauthorized { .. } => ErrorKind::Authentication,
            ClientError::Validation { .. } | ClientError::InvalidRequest { .. } => {
                ErrorKind::Validation
            }
            ClientError::Server { .. } => ErrorKind::Server,
            ClientError::Decode { .. } => ErrorKind::Decode,
            ClientError::MutationInFlight { .. } => ErrorKind::Conflict,
        }
    }

    /// Fatal for the current page: the user must sign in again.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Validation { status, .. } | ClientError::Server { status, .. } => {
                Some(*status)
            }
            ClientError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    pub fn decode<S: Into<String>>(message: S) -> Self {
        ClientError::Decode {
            message: message.into(),
        }
    }

    /// Build an error from a non-success HTTP status and the raw response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone().or_else(|| b.error.clone()))
            .unwrap_or_else(|| snippet(body));

        match status {
            401 => ClientError::Unauthorized { message },
            400..=499 => ClientError::Validation {
                status,
                message,
                field_errors: parsed.map(|b| b.field_errors()).unwrap_or_default(),
            },
            _ => ClientError::Server { status, message },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return ClientError::Decode {
                message: error.to_string(),
            };
        }
        if let Some(status) = error.status() {
            return ClientError::from_status(status.as_u16(), "");
        }
        ClientError::Transport {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError::decode(error.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(error: url::ParseError) -> Self {
        ClientError::InvalidRequest {
            message: error.to_string(),
        }
    }
}

/// Error payload shape used by the API; every field is optional.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

impl ErrorBody {
    fn field_errors(&self) -> FieldErrors {
        let mut fields = FieldErrors::new();
        let Some(serde_json::Value::Object(map)) = &self.errors else {
            return fields;
        };
        for (field, value) in map {
            let messages = match value {
                serde_json::Value::String(s) => vec![s.clone()],
                serde_json::Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                other => vec![other.to_string()],
            };
            fields.insert(field.clone(), messages);
        }
        fields
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
