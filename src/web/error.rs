use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// When enabled, every JSON error body also carries a `trace` and `code`
/// field. Set once at startup from `[app] debug`.
static DEBUG_RESPONSES: AtomicBool = AtomicBool::new(false);

pub fn set_debug_responses(enabled: bool) {
    DEBUG_RESPONSES.store(enabled, Ordering::Relaxed);
}

pub fn debug_responses() -> bool {
    DEBUG_RESPONSES.load(Ordering::Relaxed)
}

pub const SLUG_TAKEN_MESSAGE: &str = "This Slug is already being used by another post";

/// Every failure a request can surface. Each variant maps to exactly one
/// HTTP status; `IntoResponse` below is the only place that builds JSON
/// error bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("Access denied")]
    AccessDenied,
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Db(String),
    #[error("Failed to write the file")]
    FileWrite(#[source] std::io::Error),
    #[error("Failed to create a directory")]
    DirectoryCreate(#[source] std::io::Error),
    #[error("{0}")]
    DirectoryDelete(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn db(message: impl Into<String>) -> Self {
        Self::Db(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Db(_)
            | Self::FileWrite(_)
            | Self::DirectoryCreate(_)
            | Self::DirectoryDelete(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Internal error code, exposed only in debug bodies.
    fn code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 1,
            Self::AccessDenied => 2,
            Self::NotFound(_) => 3,
            Self::Validation { .. } => 4,
            Self::BadRequest(_) => 5,
            Self::Db(_) => 6,
            Self::FileWrite(_) => 7,
            Self::DirectoryCreate(_) => 8,
            Self::DirectoryDelete(_) => 9,
            Self::Internal(_) => 10,
        }
    }

    fn message(&self) -> String {
        let own = self.to_string();
        if !own.is_empty() {
            return own;
        }
        match self {
            // An empty not-found still names what went wrong.
            Self::NotFound(_) => "Record not found".to_string(),
            _ => default_status_message(self.status()),
        }
    }
}

fn default_status_message(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => "Unauthorized".to_string(),
        StatusCode::FORBIDDEN => "Forbidden".to_string(),
        StatusCode::NOT_FOUND => "Not Found".to_string(),
        StatusCode::METHOD_NOT_ALLOWED => "Method Not Allowed".to_string(),
        StatusCode::INTERNAL_SERVER_ERROR => {
            "Whoops, looks like something went wrong".to_string()
        }
        other => other
            .canonical_reason()
            .unwrap_or("Whoops, looks like something went wrong")
            .to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} response: {:?}", status.as_u16(), self);
        } else {
            tracing::warn!("{} response: {}", status.as_u16(), self);
        }

        let mut body = json!({
            "status": status.as_u16(),
            "message": self.message(),
        });
        if let Self::Validation { field, message } = &self {
            body["errors"] = json!({ *field: [message] });
        }
        if debug_responses() {
            body["trace"] = json!(format!("{:?}", self));
            body["code"] = json!(self.code());
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound(String::new()),
            other => Self::Db(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(err: r2d2::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::BadRequest(format!("Bad request: {}", err.body_text()))
    }
}

/// Deliberate non-exceptional 400 for user-correctable naming collisions.
/// This bypasses `ApiError` on purpose: a taken slug is an expected outcome
/// of the admin UI, not a failure.
pub fn soft_conflict(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
