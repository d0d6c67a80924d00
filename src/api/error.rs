//! # API Errors
//!
//! Typed failures surfaced by [`super::ServiceApi`] implementations.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with a non-success status
    #[error("Fastly API error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response
    #[error("Fastly API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape
    #[error("Failed to decode Fastly API response for {operation}: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Build an HTTP error from a status code and raw response body.
    ///
    /// Fastly reports failures either as `{"msg": ..., "detail": ...}` or,
    /// on JSON:API endpoints, as `{"errors": [{"title": ..., "detail": ...}]}`.
    /// Anything else is kept verbatim.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                msg: Some(msg),
                detail,
                ..
            }) => match detail {
                Some(detail) if !detail.is_empty() => format!("{msg}: {detail}"),
                _ => msg,
            },
            Ok(ErrorBody { errors, .. }) if !errors.is_empty() => errors
                .into_iter()
                .map(|e| match (e.title, e.detail) {
                    (Some(title), Some(detail)) => format!("{title}: {detail}"),
                    (Some(text), None) | (None, Some(text)) => text,
                    (None, None) => "unknown error".to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            _ => body.trim().to_string(),
        };
        Self::Http { status, message }
    }

    /// HTTP status, when the API produced one
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode { .. } => None,
        }
    }

    /// A 404 usually means the object was removed outside this controller.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<JsonApiError>,
}

#[derive(Debug, Deserialize)]
struct JsonApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}
