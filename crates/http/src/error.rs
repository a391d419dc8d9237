//! Error handling for the bookshelf HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Text sent in place of database error detail when it is not exposed
pub const REDACTED_MESSAGE: &str = "internal server error";

/// Application error types that map to HTTP responses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Caller-supplied input was rejected; rendered as 400 `{"error": message}`
    #[error("{message}")]
    Validation { message: String },

    /// The database call failed; rendered as 500.
    ///
    /// With a `context` the body is `{"error": context, "message": message}`,
    /// without one it is `{"error": message}`.
    #[error("{}", render_store(.context, .message))]
    Store {
        context: Option<&'static str>,
        message: String,
    },
}

fn render_store(context: &Option<&'static str>, message: &str) -> String {
    match context {
        Some(context) => format!("{}: {}", context, message),
        None => message.to_string(),
    }
}

impl AppError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a store error carrying the database's own message
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            context: None,
            message: message.into(),
        }
    }

    /// Attach an operation summary to a store error; validation errors are
    /// returned unchanged
    pub fn with_context(self, context: &'static str) -> Self {
        match self {
            Self::Store { message, .. } => Self::Store {
                context: Some(context),
                message,
            },
            other => other,
        }
    }

    /// Replace database error detail with [`REDACTED_MESSAGE`]
    pub fn redacted(self) -> Self {
        match self {
            Self::Store { context, .. } => Self::Store {
                context,
                message: REDACTED_MESSAGE.to_string(),
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::Validation { message } => {
                tracing::debug!(status_code = %status.as_u16(), %message, "request rejected");
                json!({ "error": message })
            }
            AppError::Store { context, message } => {
                let error_id = Uuid::new_v4();
                tracing::error!(
                    error_id = %error_id,
                    status_code = %status.as_u16(),
                    context = context.unwrap_or("-"),
                    %message,
                    "Request error"
                );
                match context {
                    Some(context) => json!({ "error": context, "message": message }),
                    None => json!({ "error": message }),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}
