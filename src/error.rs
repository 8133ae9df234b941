use reqwest::StatusCode;

use crate::realtime::RealtimeError;
use crate::session::SessionError;

/// Coarse classification controllers use to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    RateLimited,
    NotFound,
    Server,
    Transport,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("API returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::NotAuthenticated => ErrorKind::Unauthorized,
            ClientError::Api { status, .. } => match *status {
                StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
                StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
                StatusCode::NOT_FOUND => ErrorKind::NotFound,
                _ => ErrorKind::Server,
            },
            ClientError::Http(e) => match e.status() {
                Some(StatusCode::UNAUTHORIZED) => ErrorKind::Unauthorized,
                Some(StatusCode::TOO_MANY_REQUESTS) => ErrorKind::RateLimited,
                Some(StatusCode::NOT_FOUND) => ErrorKind::NotFound,
                Some(_) => ErrorKind::Server,
                None => ErrorKind::Transport,
            },
            ClientError::Json(_)
            | ClientError::Url(_)
            | ClientError::Io(_)
            | ClientError::Session(_)
            | ClientError::Realtime(_) => ErrorKind::Transport,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status(),
            _ => None,
        }
    }

    /// The message the server put in the body, if any. The API answers with
    /// either `{"error": "..."}`, `{"message": "..."}` or plain text.
    pub fn server_message(&self) -> Option<String> {
        let ClientError::Api { body, .. } = self else {
            return None;
        };
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            return match value {
                serde_json::Value::Object(map) => map
                    .get("error")
                    .or_else(|| map.get("message"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                serde_json::Value::String(s) => Some(s),
                _ => None,
            };
        }
        Some(body.to_string())
    }

    /// Server message when present, otherwise `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        self.server_message()
            .unwrap_or_else(|| fallback.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
