//! Upload validation: turns a multipart form into a decoded image and the
//! requested language hint, or a client-facing [`UploadError`].

use crate::config::{ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES};
use actix_multipart::Multipart;
use futures_util::TryStreamExt;
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

/// Form field carrying the image file
pub const IMAGE_FIELD: &str = "image";

/// Optional form field carrying the language hint
pub const LANGUAGE_FIELD: &str = "language";

/// Why an upload was rejected. Every variant is the client's fault.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No image file found in request")]
    MissingField,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid file format. Accepted: PNG, JPG, JPEG, GIF, BMP")]
    UnsupportedFormat,

    #[error("File exceeds the {} MiB upload limit", .limit / (1024 * 1024))]
    PayloadTooLarge { limit: usize },

    #[error("Could not decode image: {0}")]
    DecodeError(String),

    #[error("Malformed multipart body: {0}")]
    Malformed(String),
}

/// A validated but not yet decoded upload
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub language: Option<String>,
}

impl Upload {
    /// Decode the uploaded bytes into an in-memory raster
    pub fn decode(&self) -> Result<DynamicImage, UploadError> {
        image::load_from_memory(&self.bytes).map_err(|e| UploadError::DecodeError(e.to_string()))
    }
}

/// True when `filename` has an extension from the allow-list. Only the text
/// after the last `.` counts, so `archive.png.exe` is rejected.
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Check the filename of the image part
pub fn check_filename(filename: Option<&str>) -> Result<&str, UploadError> {
    match filename {
        None => Err(UploadError::MissingField),
        Some("") => Err(UploadError::EmptyFilename),
        Some(name) if !allowed_file(name) => Err(UploadError::UnsupportedFormat),
        Some(name) => Ok(name),
    }
}

/// Counts every body byte read from the form against one shared limit
struct Budget {
    limit: usize,
    used: usize,
}

impl Budget {
    fn take(&mut self, n: usize) -> Result<(), UploadError> {
        self.used += n;
        if self.used > self.limit {
            return Err(UploadError::PayloadTooLarge { limit: self.limit });
        }
        Ok(())
    }
}

/// Read the multipart form with the default 16 MiB limit
pub async fn read_upload(payload: Multipart) -> Result<Upload, UploadError> {
    read_upload_with_limit(payload, MAX_UPLOAD_BYTES).await
}

/// Read the multipart form, validating the image part as soon as its headers
/// arrive and aborting once more than `limit` body bytes have been read
pub async fn read_upload_with_limit(
    mut payload: Multipart,
    limit: usize,
) -> Result<Upload, UploadError> {
    let mut budget = Budget { limit, used: 0 };
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut language: Option<String> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        let disposition = field.content_disposition().clone();
        let name = disposition.get_name().unwrap_or_default();

        match name {
            IMAGE_FIELD if image.is_none() => {
                let filename = check_filename(disposition.get_filename())?.to_string();
                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|e| UploadError::Malformed(e.to_string()))?
                {
                    budget.take(chunk.len())?;
                    bytes.extend_from_slice(&chunk);
                }
                debug!("received {} ({} bytes)", filename, bytes.len());
                image = Some((filename, bytes));
            }
            LANGUAGE_FIELD if language.is_none() => {
                let mut raw = Vec::new();
                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|e| UploadError::Malformed(e.to_string()))?
                {
                    budget.take(chunk.len())?;
                    raw.extend_from_slice(&chunk);
                }
                language = Some(String::from_utf8_lossy(&raw).trim().to_string());
            }
            _ => {
                // Drain unknown or repeated parts so the stream can advance
                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|e| UploadError::Malformed(e.to_string()))?
                {
                    budget.take(chunk.len())?;
                }
            }
        }
    }

    let (filename, bytes) = image.ok_or(UploadError::MissingField)?;
    Ok(Upload {
        filename,
        bytes,
        language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_extensions_in_any_case() {
        for name in ["a.png", "b.JPG", "c.Jpeg", "d.gif", "e.BMP", "scan.v2.png"] {
            assert!(allowed_file(name), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_missing_or_unknown_extensions() {
        for name in ["png", "image", "doc.pdf", "photo.png.exe", "trailing.", "x.tiff"] {
            assert!(!allowed_file(name), "{name} should be rejected");
        }
    }

    #[test]
    fn filename_checks_run_in_order() {
        assert!(matches!(check_filename(None), Err(UploadError::MissingField)));
        assert!(matches!(
            check_filename(Some("")),
            Err(UploadError::EmptyFilename)
        ));
        assert!(matches!(
            check_filename(Some("notes.txt")),
            Err(UploadError::UnsupportedFormat)
        ));
        assert_eq!(check_filename(Some("page.png")).unwrap(), "page.png");
    }

    #[test]
    fn budget_trips_past_the_limit() {
        let mut budget = Budget { limit: 10, used: 0 };
        assert!(budget.take(6).is_ok());
        assert!(budget.take(4).is_ok());
        assert!(matches!(
            budget.take(1),
            Err(UploadError::PayloadTooLarge { limit: 10 })
        ));
    }

    #[test]
    fn oversize_message_names_the_limit() {
        let err = UploadError::PayloadTooLarge {
            limit: MAX_UPLOAD_BYTES,
        };
        assert_eq!(err.to_string(), "File exceeds the 16 MiB upload limit");
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        let upload = Upload {
            filename: "broken.png".to_string(),
            bytes: b"definitely not a png".to_vec(),
            language: None,
        };
        assert!(matches!(upload.decode(), Err(UploadError::DecodeError(_))));
    }
}
