use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use ticket_mailer::{
    api,
    booker::BookingApp,
    config::{Config, MAX_UPLOAD_BYTES},
    mailer::{MailError, MailSender, OutgoingMail, RecordingMailer},
    ticket::is_generated_ticket_id,
};
use tower::ServiceExt;

const BOUNDARY: &str = "X-TICKET-MAILER-BOUNDARY";

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                field,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn jane_parts<'a>() -> Vec<Part<'a>> {
    vec![
        Part::Text("name", "Jane Doe"),
        Part::Text("email", "jane@example.com"),
        Part::Text("phone", "1234567890"),
    ]
}

fn config(upload_dir: &Path) -> Config {
    let mut config = Config::default();
    config.upload_dir = upload_dir.to_path_buf();
    config.smtp.user = Some("tickets@example.com".to_string());
    config.smtp.password = Some("secret".to_string());
    config
}

fn app(mailer: &RecordingMailer, upload_dir: &Path) -> Router {
    api::router(BookingApp::new(config(upload_dir), Arc::new(mailer.clone())))
}

/// Never answers within a test's lifetime.
struct HungMailer;

#[async_trait]
impl MailSender for HungMailer {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

struct PanickingMailer;

#[async_trait]
impl MailSender for PanickingMailer {
    async fn send(&self, _mail: OutgoingMail) -> Result<(), MailError> {
        panic!("mail provider client blew up");
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/book")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/book")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn jane_doe_json_booking_gets_fallback_ticket() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let (status, body) = send(
        app(&mailer, tmp.path()),
        json_request(json!({
            "name": "Jane Doe",
            "email": "jane@example.com",
            "phone": "1234567890",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let ticket_id = body["ticketId"].as_str().unwrap();
    assert!(is_generated_ticket_id(ticket_id), "bad ticket id {ticket_id}");
    assert!(body["message"].is_string());

    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@example.com");
    assert!(sent[0].html.contains("Jane Doe"));
    assert!(sent[0].html.contains("Premam"));
    assert!(sent[0].html.contains(ticket_id));
}

#[tokio::test]
async fn missing_required_fields_is_bad_request() {
    let bodies = [
        json!({"email": "jane@example.com", "phone": "1234567890"}),
        json!({"name": "Jane Doe", "phone": "1234567890"}),
        json!({"name": "Jane Doe", "email": "jane@example.com", "phone": ""}),
        json!({}),
    ];

    for body in bodies {
        let tmp = tempfile::tempdir().unwrap();
        let mailer = RecordingMailer::new();
        let (status, response) = send(app(&mailer, tmp.path()), json_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({"error": "Missing required fields"}));
        assert!(mailer.sent().await.is_empty());
    }
}

#[tokio::test]
async fn supplied_ticket_id_is_echoed() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/book")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(
            "name=Jane+Doe&email=jane%40example.com&phone=1234567890&ticketId=abc-%2F-007",
        ))
        .unwrap();

    let (status, body) = send(app(&mailer, tmp.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticketId"], "abc-/-007");
}

#[tokio::test]
async fn image_upload_is_stored_and_attached() {
    let tmp = tempfile::tempdir().unwrap();
    let upload_dir = tmp.path().join("uploads");
    let mailer = RecordingMailer::new();

    let mut parts = jane_parts();
    parts.push(Part::Text("semester", "S4"));
    parts.push(Part::Text("screenshotURL", "https://img.example.com/ignored.png"));
    parts.push(Part::File {
        field: "screenshot",
        filename: "payment.png",
        content_type: "image/png",
        bytes: b"\x89PNG\r\n\x1a\nfake",
    });

    let (status, body) = send(app(&mailer, &upload_dir), multipart_request(&parts)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);

    let attachment = sent[0].attachment.as_ref().unwrap();
    assert_eq!(attachment.content_type, "image/png");
    assert_eq!(attachment.path, upload_dir.join(&attachment.filename));
    assert!(attachment.filename.ends_with(".png"));
    assert_eq!(
        std::fs::read(&attachment.path).unwrap(),
        b"\x89PNG\r\n\x1a\nfake"
    );
    assert!(sent[0].html.contains("S4"));
    assert!(!sent[0].html.contains("https://img.example.com/ignored.png"));
}

#[tokio::test]
async fn screenshot_url_without_file_is_mentioned() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let mut parts = jane_parts();
    parts.push(Part::Text("screenshotURL", "https://img.example.com/pay.png"));

    let (status, _) = send(app(&mailer, tmp.path()), multipart_request(&parts)).await;

    assert_eq!(status, StatusCode::OK);
    let sent = mailer.sent().await;
    assert!(sent[0].attachment.is_none());
    assert!(sent[0].html.contains("https://img.example.com/pay.png"));
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let mut parts = jane_parts();
    parts.push(Part::File {
        field: "screenshot",
        filename: "notes.txt",
        content_type: "text/plain",
        bytes: b"not an image",
    });

    let (status, body) = send(app(&mailer, tmp.path()), multipart_request(&parts)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert!(body.get("details").is_none());
    assert!(mailer.sent().await.is_empty());
    assert_eq!(files_in(tmp.path()), 0);
}

#[tokio::test]
async fn oversize_upload_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();
    let big = vec![0u8; MAX_UPLOAD_BYTES + 1];

    let mut parts = jane_parts();
    parts.push(Part::File {
        field: "screenshot",
        filename: "huge.jpg",
        content_type: "image/jpeg",
        bytes: &big,
    });

    let (status, _) = send(app(&mailer, tmp.path()), multipart_request(&parts)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(mailer.sent().await.is_empty());
    assert_eq!(files_in(tmp.path()), 0);
}

#[tokio::test]
async fn file_on_unexpected_field_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let mut parts = jane_parts();
    parts.push(Part::File {
        field: "avatar",
        filename: "me.png",
        content_type: "image/png",
        bytes: b"png",
    });

    let (status, _) = send(app(&mailer, tmp.path()), multipart_request(&parts)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(mailer.sent().await.is_empty());
}

#[tokio::test]
async fn mail_failure_reports_details_and_keeps_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::failing("535 5.7.8 Username and Password not accepted");

    let mut parts = jane_parts();
    parts.push(Part::File {
        field: "screenshot",
        filename: "payment.jpg",
        content_type: "image/jpeg",
        bytes: b"jpeg",
    });

    let (status, body) = send(app(&mailer, tmp.path()), multipart_request(&parts)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to send confirmation email");
    assert_eq!(
        body["details"],
        "535 5.7.8 Username and Password not accepted"
    );
    assert_eq!(files_in(tmp.path()), 1);
}

#[tokio::test]
async fn health_is_always_ok() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::failing("down");

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&mailer, tmp.path()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK", "message": "Server is running"}));
}

#[tokio::test]
async fn preflight_is_answered_for_any_origin() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/book")
        .header(header::ORIGIN, "https://tickets.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app(&mailer, tmp.path()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let request = Request::builder()
        .uri("/tickets")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&mailer, tmp.path()), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Not found"}));
}

#[tokio::test]
async fn hung_mail_provider_times_out_as_generic_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.mail_timeout = Some(Duration::from_millis(100));
    let app = api::router(BookingApp::new(config, Arc::new(HungMailer)));

    let (status, body) = send(
        app,
        json_request(json!({
            "name": "Jane Doe",
            "email": "jane@example.com",
            "phone": "1234567890",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Internal server error"}));
}

#[tokio::test]
async fn handler_panic_is_generic_json_error() {
    let tmp = tempfile::tempdir().unwrap();
    let app = api::router(BookingApp::new(config(tmp.path()), Arc::new(PanickingMailer)));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/book")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, "https://tickets.example.org")
        .body(Body::from(
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "phone": "1234567890",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"error": "Internal server error"}));
}

#[tokio::test]
async fn wrong_method_is_json_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mailer = RecordingMailer::new();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/book")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&mailer, tmp.path()), request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "Method not allowed"}));
    assert!(mailer.sent().await.is_empty());
}
