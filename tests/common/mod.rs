//! Multipart request helpers shared by the route test binaries
#![allow(dead_code)]

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use ocr_server::recognizer::Recognizer;
use ocr_server::server::{self, AppState};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;

pub const BOUNDARY: &str = "----ocr-server-test-boundary";

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: Option<&'a str>,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                filename,
                bytes,
            } => {
                let disposition = match filename {
                    Some(filename) => {
                        format!("form-data; name=\"{name}\"; filename=\"{filename}\"")
                    }
                    None => format!("form-data; name=\"{name}\""),
                };
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: {disposition}\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn encode(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

pub fn image_part<'a>(filename: &'a str, bytes: &'a [u8]) -> Part<'a> {
    Part::File {
        name: "image",
        filename: Some(filename),
        bytes,
    }
}

/// Small white PNG
pub fn png_bytes() -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
        40,
        20,
        Rgb([255, 255, 255]),
    )))
}

/// POST `body` to `/ocr` on a fresh app backed by `recognizer`
pub async fn post_ocr(recognizer: Arc<dyn Recognizer>, body: Vec<u8>) -> (StatusCode, Value) {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState::new(recognizer, "vie+eng")))
            .configure(server::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/ocr")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
        .to_request();

    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let json: Value = test::read_body_json(resp).await;
    (status, json)
}
