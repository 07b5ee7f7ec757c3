//! HTTP handlers. Each `/ocr` request walks received → validated → decoded →
//! backend invoked → responded, and nothing survives between requests.

use super::protocol::{HealthResponse, OcrResponse};
use super::{AppState, WebError};
use crate::recognizer::Language;
use crate::upload;
use actix_multipart::Multipart;
use actix_web::http::header::ContentType;
use actix_web::{get, post, web, HttpResponse, Responder};
use anyhow::anyhow;
use futures_util::FutureExt;
use image::GenericImageView;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, WebError>;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Static upload page
#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(INDEX_HTML)
}

/// Extract text from an uploaded image
#[post("/ocr")]
pub async fn ocr(payload: Multipart, state: web::Data<AppState>) -> Result<impl Responder> {
    // Outermost boundary: a panic anywhere below becomes a 500 instead of a
    // dropped connection
    match AssertUnwindSafe(recognize_upload(payload, &state))
        .catch_unwind()
        .await
    {
        Ok(response) => Ok(web::Json(response?)),
        Err(panic) => Err(WebError::Internal(anyhow!(panic_message(panic.as_ref())))),
    }
}

async fn recognize_upload(payload: Multipart, state: &AppState) -> Result<OcrResponse> {
    let upload = upload::read_upload(payload).await?;
    debug!("validated upload {} ({} bytes)", upload.filename, upload.bytes.len());

    // Decoding is CPU-bound; keep it off the worker serving other requests
    let (upload, decoded) = web::block(move || {
        let decoded = upload.decode();
        (upload, decoded)
    })
    .await
    .map_err(|e| WebError::Internal(anyhow!("image decode task failed: {e}")))?;
    let image = Arc::new(decoded?);
    let (width, height) = image.dimensions();
    debug!("decoded {} as {width}x{height}", upload.filename);

    let language = Language::from_hint(
        upload
            .language
            .as_deref()
            .unwrap_or(&state.default_language),
    );

    let text = state.recognizer.recognize(image, language).await?;
    debug!(
        "{} returned {} characters ({language})",
        state.recognizer.name(),
        text.len()
    );

    info!("finished serving OCR request for {}", upload.filename);
    Ok(OcrResponse::from_text(&text))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected panic while handling request".to_string()
    }
}

/// Liveness plus the backend's own status field. Always 200.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let status = state.recognizer.engine_status().await;
    web::Json(HealthResponse(status))
}
