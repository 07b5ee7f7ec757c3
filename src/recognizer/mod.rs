//! Recognition backends. The server only sees the [`Recognizer`] trait; the
//! concrete variant is picked once at start-up from [`Settings`].

use crate::config::{BackendKind, Settings};
use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

pub mod local;
pub mod remote;

pub use local::LocalRecognizer;
pub use remote::RemoteRecognizer;

/// Language dictionary the engine should prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    Vie,
    Eng,
    #[default]
    VieEng,
}

impl Language {
    /// Map a client-supplied hint. Anything unrecognised becomes `VieEng`.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim() {
            "vie" => Language::Vie,
            "eng" => Language::Eng,
            _ => Language::VieEng,
        }
    }

    /// Code understood by both engines
    pub fn code(&self) -> &'static str {
        match self {
            Language::Vie => "vie",
            Language::Eng => "eng",
            Language::VieEng => "vie+eng",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Failures raised by a backend while recognising an image
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("OCR engine not found at {0}")]
    EngineNotFound(String),

    #[error("{0}")]
    EngineError(String),

    #[error("API Error: {0}")]
    NetworkError(String),

    #[error("{0}")]
    ApiProcessingError(String),

    #[error("API Error: unexpected response: {0}")]
    MalformedResponse(String),
}

/// A single health field reported by `/health`, e.g. `tesseract: installed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub key: &'static str,
    pub value: String,
}

/// Common interface for all recognition backends
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extract text from `image`. Implementations return the text with
    /// leading and trailing whitespace removed.
    async fn recognize(
        &self,
        image: Arc<DynamicImage>,
        language: Language,
    ) -> Result<String, BackendError>;

    /// Backend-specific health field. Never fails.
    async fn engine_status(&self) -> EngineStatus;
}

/// Serialize `image` as PNG, the format both backends hand to their engine
pub fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|e| BackendError::EngineError(format!("failed to encode image: {e}")))?;
    Ok(png)
}

/// [`png_bytes`] on the blocking pool so large images do not stall the
/// request executor
pub async fn encode_png(image: Arc<DynamicImage>) -> Result<Vec<u8>, BackendError> {
    tokio::task::spawn_blocking(move || png_bytes(&image))
        .await
        .map_err(|e| BackendError::EngineError(format!("image encode task failed: {e}")))?
}

/// Build the backend selected in `settings`
pub fn from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn Recognizer>> {
    let recognizer: Arc<dyn Recognizer> = match settings.backend {
        BackendKind::Local => Arc::new(LocalRecognizer::from_settings(&settings.local)),
        BackendKind::Remote => Arc::new(RemoteRecognizer::from_settings(&settings.remote)?),
    };
    Ok(recognizer)
}
