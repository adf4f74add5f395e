use crate::mailer::MailError;
use crate::upload::UploadError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::any::Any;
use tracing::error;

pub const MISSING_FIELDS: &str = "Missing required fields";
pub const MAIL_FAILED: &str = "Failed to send confirmation email";
pub const INTERNAL: &str = "Internal server error";

/// Everything that can end a `/book` request early.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("upload rejected: {0}")]
    Upload(#[from] UploadError),
    #[error("mail send failed: {0}")]
    Mail(#[from] MailError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            details: None,
        }
    }
}

impl BookingError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::MissingFields => ErrorBody::new(MISSING_FIELDS),
            Self::Mail(e) => ErrorBody {
                error: MAIL_FAILED.to_string(),
                details: Some(e.to_string()),
            },
            // upload rejections are not told apart from other faults
            Self::Upload(_) | Self::Internal(_) => ErrorBody::new(INTERNAL),
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            error!("Error handling booking: {:#}", self);
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// Turns a handler panic into the same generic JSON body as any other fault.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let reason = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", reason);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(INTERNAL)),
    )
        .into_response()
}
