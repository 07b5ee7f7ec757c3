//! Recognition through the OCR.space web API. The image is re-encoded as a
//! base64 PNG data URI and posted as an urlencoded form.

use super::{encode_png, BackendError, EngineStatus, Language, Recognizer};
use crate::config::RemoteSettings;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const UNKNOWN_API_ERROR: &str = "Unknown error from OCR API";

/// Client for one OCR.space endpoint
#[derive(Clone)]
pub struct RemoteRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine: u8,
}

impl fmt::Debug for RemoteRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRecognizer")
            .field("endpoint", &self.endpoint)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl RemoteRecognizer {
    pub fn from_settings(settings: &RemoteSettings) -> anyhow::Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("remote backend requires an API key"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("failed to create HTTP client")?;

        Ok(RemoteRecognizer {
            client,
            endpoint: settings.endpoint.clone(),
            api_key,
            engine: settings.engine,
        })
    }

    /// Form fields for one parse request
    fn form(&self, png: &[u8], language: Language) -> Vec<(&'static str, String)> {
        vec![
            (
                "base64Image",
                format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png)),
            ),
            ("apikey", self.api_key.clone()),
            ("language", language.code().to_string()),
            ("isOverlayRequired", "false".to_string()),
            ("OCREngine", self.engine.to_string()),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParseResponse {
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<Value>,
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    parsed_text: Option<String>,
}

/// The API sends `ErrorMessage` either as a string or a list of strings
fn error_text(message: Option<Value>) -> String {
    let text = match message {
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("; "),
        _ => String::new(),
    };

    if text.trim().is_empty() {
        UNKNOWN_API_ERROR.to_string()
    } else {
        text
    }
}

/// Interpret a response body from the parse endpoint
pub fn parse_response(body: &str) -> Result<String, BackendError> {
    let response: ParseResponse =
        serde_json::from_str(body).map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    if response.is_errored_on_processing {
        return Err(BackendError::ApiProcessingError(error_text(
            response.error_message,
        )));
    }

    response
        .parsed_results
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.parsed_text)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| BackendError::MalformedResponse("missing ParsedResults[0].ParsedText".into()))
}

#[async_trait]
impl Recognizer for RemoteRecognizer {
    fn name(&self) -> &'static str {
        "ocr.space"
    }

    async fn recognize(
        &self,
        image: Arc<DynamicImage>,
        language: Language,
    ) -> Result<String, BackendError> {
        let png = encode_png(image).await?;

        debug!("posting {} bytes to {} ({language})", png.len(), self.endpoint);

        let body = self
            .client
            .post(&self.endpoint)
            .form(&self.form(&png, language))
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?
            .text()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        parse_response(&body)
    }

    async fn engine_status(&self) -> EngineStatus {
        EngineStatus {
            key: "ocr_engine",
            value: "ocr.space_api".to_string(),
        }
    }
}
