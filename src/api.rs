use crate::booker::{BookingApp, BookingConfirmation, BookingSubmission};
use crate::error::{panic_response, BookingError, ErrorBody};
use axum::{
    debug_handler,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing::{debug, trace};

// room for the text fields and multipart framing around a full size screenshot
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
}

#[debug_handler(state = BookingApp)]
async fn handle_new_booking(
    State(booker): State<BookingApp>,
    submission: BookingSubmission,
) -> Result<Json<BookingConfirmation>, BookingError> {
    trace!(
        "New booking, screenshot attached: {}",
        submission.screenshot.is_some()
    );
    booker.handle_new_booking(submission).await.map(Json)
}

async fn handle_health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK",
        message: "Server is running",
    })
}

async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not found")))
}

async fn handle_method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("Method not allowed")),
    )
}

/// Builds the full service: routes, CORS, panic handling and body limits.
pub fn router(booker: BookingApp) -> Router {
    let body_limit = booker.uploads().max_bytes() + FORM_OVERHEAD_BYTES;
    debug!("Request body limit: {} bytes", body_limit);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let middleware = tower::ServiceBuilder::new()
        .layer(cors)
        .layer(CompressionLayer::new().quality(tower_http::CompressionLevel::Fastest))
        .layer(CatchPanicLayer::custom(panic_response));

    Router::new()
        .route(
            "/book",
            post(handle_new_booking).fallback(handle_method_not_allowed),
        )
        .route(
            "/health",
            get(handle_health).fallback(handle_method_not_allowed),
        )
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(booker)
        .layer(middleware)
}
