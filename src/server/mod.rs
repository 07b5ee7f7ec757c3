//! The user-facing JSON web server. Uploads arrive on `/ocr`, are validated
//! and decoded, and are forwarded to whichever [`Recognizer`] the process was
//! started with.

use crate::recognizer::{BackendError, Recognizer};
use crate::upload::UploadError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::warn;

pub mod protocol;
pub mod routes;

/// Shared, read-only state handed to every request
pub struct AppState {
    pub recognizer: Arc<dyn Recognizer>,

    /// Language hint used when the form has no `language` field
    pub default_language: String,
}

impl AppState {
    pub fn new(recognizer: Arc<dyn Recognizer>, default_language: impl Into<String>) -> Self {
        AppState {
            recognizer,
            default_language: default_language.into(),
        }
    }
}

/// Register every route on an `App`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(routes::index)
        .service(routes::ocr)
        .service(routes::health);
}

#[derive(Debug)]
pub enum WebError {
    /// The upload was rejected before reaching a backend
    Validation(UploadError),

    /// The backend failed to produce text
    Backend(BackendError),

    /// Anything else, including panics caught at the handler boundary
    Internal(anyhow::Error),
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebError::Validation(err) => write!(f, "{err}"),
            WebError::Backend(err) => write!(f, "OCR error: {err}"),
            WebError::Internal(err) => write!(f, "Server error: {err}"),
        }
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        warn!("request failed ({}): {self}", self.status_code());

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(protocol::ErrorResponse {
                error: self.to_string(),
            })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            WebError::Validation(_) => StatusCode::BAD_REQUEST,
            WebError::Backend(_) | WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UploadError> for WebError {
    fn from(err: UploadError) -> WebError {
        WebError::Validation(err)
    }
}

impl From<BackendError> for WebError {
    fn from(err: BackendError) -> WebError {
        WebError::Backend(err)
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> WebError {
        WebError::Internal(err)
    }
}
