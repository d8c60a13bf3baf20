use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use image::DynamicImage;
use serde_json::{json, Value};
use tower::ServiceExt;

use civicflo_ai::{router, AppState, CivicTaxonomy, Detect, Detection};

const BOUNDARY: &str = "civicflo-test-boundary";

/// Detector stub returning a canned result, so the HTTP layer can be driven
/// without an ONNX session.
struct StaticDetector {
    detections: Vec<Detection>,
}

#[async_trait]
impl Detect for StaticDetector {
    async fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}

fn det(class: &str, confidence: f32) -> Detection {
    Detection {
        class_name: class.to_string(),
        confidence,
        bbox: [10.0, 10.0, 50.0, 50.0],
    }
}

fn test_app(detections: Vec<Detection>) -> axum::Router {
    let taxonomy = CivicTaxonomy::from_map(HashMap::from([
        ("car".to_string(), "illegal_parking".to_string()),
        ("bottle".to_string(), "litter".to_string()),
    ]));
    router(AppState::new(Arc::new(StaticDetector { detections }), taxonomy))
}

fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]));
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn multipart_request(field: &str, filename: Option<&str>, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    match filename {
        Some(name) => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"\r\n").as_bytes(),
        ),
    }
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_fixed_payload() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "healthy", "service": "civicflo-ai" })
    );
}

#[tokio::test]
async fn missing_image_field_is_rejected() {
    let app = test_app(vec![det("car", 0.9)]);
    let response = app
        .oneshot(multipart_request("file", Some("photo.png"), &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": "No image part" }));
}

#[tokio::test]
async fn empty_filename_is_rejected() {
    let app = test_app(vec![det("car", 0.9)]);
    let response = app
        .oneshot(multipart_request("image", None, &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "No selected file" })
    );
}

#[tokio::test]
async fn disallowed_extension_is_rejected_regardless_of_content() {
    let app = test_app(vec![det("car", 0.9)]);
    let response = app
        .oneshot(multipart_request("image", Some("photo.gif"), &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Invalid file type" })
    );
}

#[tokio::test]
async fn highest_confidence_detection_wins() {
    let app = test_app(vec![det("car", 0.9), det("bottle", 0.4)]);
    let response = app
        .oneshot(multipart_request("image", Some("photo.jpg"), &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "class": "car",
            "confidence": 0.9,
            "valid": true,
            "civic_issue": "illegal_parking"
        })
    );
}

#[tokio::test]
async fn no_detection_reports_reason() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(multipart_request("image", Some("photo.png"), &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "valid": false,
            "reason": "No object detected with sufficient confidence"
        })
    );
}

#[tokio::test]
async fn unmapped_class_gets_default_tag() {
    let app = test_app(vec![det("person", 0.8)]);
    let response = app
        .oneshot(multipart_request("image", Some("photo.png"), &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["class"], "person");
    assert_eq!(body["civic_issue"], "uncategorized_issue");
}

#[tokio::test]
async fn undecodable_image_is_a_server_error() {
    let app = test_app(vec![det("car", 0.9)]);
    let response = app
        .oneshot(multipart_request("image", Some("photo.png"), b"not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(response).await["error"].is_string());
}
