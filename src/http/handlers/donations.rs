use crate::domain::donation::CreateDonationRequest;
use crate::domain::error::DonationError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use std::time::Duration;

const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(3);
const CONFIRMATION_MAX_ATTEMPTS: u32 = 10;

pub async fn create_donation(
    State(state): State<AppState>,
    Json(req): Json<CreateDonationRequest>,
) -> impl IntoResponse {
    match state.donation_service.process(req).await {
        Ok(resp) => (axum::http::StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(donation_id): Path<String>,
) -> impl IntoResponse {
    match state.reconciler.check(&donation_id).await {
        Ok(resp) => (axum::http::StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Blocks until the donation settles or the polling ceiling is hit; used by
/// push-prompt flows where the payer confirms on their handset while the form
/// waits.
pub async fn await_confirmation(
    State(state): State<AppState>,
    Path(donation_id): Path<String>,
) -> impl IntoResponse {
    match state
        .reconciler
        .poll_until_terminal(&donation_id, CONFIRMATION_POLL_INTERVAL, CONFIRMATION_MAX_ATTEMPTS)
        .await
    {
        Ok(resp) => (axum::http::StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

pub(crate) fn error_response(e: DonationError) -> axum::response::Response {
    if matches!(e, DonationError::Internal(_)) {
        tracing::error!(error = %e, "request failed");
    }
    (e.status(), Json(e.envelope())).into_response()
}
