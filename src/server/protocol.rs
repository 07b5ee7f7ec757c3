use crate::recognizer::EngineStatus;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Shown when the backend succeeds but finds no text
pub const EMPTY_TEXT_WARNING: &str =
    "No text detected in the image. Please try another image with clearer text.";

/// Body of every non-2xx response
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of a successful `/ocr` call
#[derive(Debug, serde::Serialize, PartialEq)]
#[serde(untagged)]
pub enum OcrResponse {
    Text { text: String, success: bool },
    NoText { text: String, warning: String },
}

impl OcrResponse {
    /// Build the response for backend output, which may be blank
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            OcrResponse::NoText {
                text: String::new(),
                warning: EMPTY_TEXT_WARNING.to_string(),
            }
        } else {
            OcrResponse::Text {
                text: text.to_string(),
                success: true,
            }
        }
    }
}

/// `{"status": "OK", <engine key>: <engine value>}`
pub struct HealthResponse(pub EngineStatus);

impl Serialize for HealthResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("status", "OK")?;
        map.serialize_entry(self.0.key, &self.0.value)?;
        map.end()
    }
}
