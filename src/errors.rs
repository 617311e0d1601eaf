use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

use crate::{data_formats::Envelope, JsonResponse};

/// Errors raised by the persistence layer in `db_helpers`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("failed to serialize article snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("failed to hash password")]
    Password,
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(e)) => {
                e.message().contains("UNIQUE constraint failed")
            }
            _ => false,
        }
    }

    /// True for SQLite `BUSY`/`LOCKED` and their extended codes, e.g. a
    /// stale read snapshot that lost a write race.
    pub fn is_busy(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(e)) => e
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map_or(false, |code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound(Option<String>),
    #[error("{message}: {source}")]
    Store {
        message: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl RequestError {
    /// Builds a mapper for store failures. Missing rows become 404, everything
    /// else is reported as a 500 with `message` in the envelope.
    pub fn store(message: &'static str) -> impl FnOnce(StoreError) -> RequestError {
        move |source| match source {
            StoreError::NotFound => RequestError::NotFound(Some(source.to_string())),
            source => RequestError::Store { message, source },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RequestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::Store { .. } | RequestError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_json_response(&self) -> JsonResponse<Envelope<Value>> {
        let envelope = match self {
            RequestError::Unauthorized(reason) => {
                tracing::warn!(%reason, "Rejected unauthenticated request");
                Envelope::new("Unauthorized", Some(Value::from(reason.as_str())))
            }
            RequestError::BadRequest(reason) => {
                tracing::warn!(%reason, "Rejected malformed request");
                Envelope::new("Bad Request", Some(Value::from(reason.as_str())))
            }
            RequestError::NotFound(detail) => {
                Envelope::new("Not found", detail.as_deref().map(Value::from))
            }
            RequestError::Store { message, source } => {
                tracing::error!(error = %source, "{}", message);
                Envelope::new(*message, Some(Value::from(source.to_string())))
            }
            RequestError::Internal(reason) => {
                tracing::error!(%reason, "Internal server error");
                Envelope::new("Internal server error", Some(Value::from(reason.as_str())))
            }
        };
        (self.status_code(), Json(envelope))
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}
