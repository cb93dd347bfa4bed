use crate::http::handlers::donations::error_response;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;

/// Generic per-gateway callback entry point. Providers only need the status
/// code: 200 acknowledges, 400 rejects the payload, 404 means no such
/// gateway.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(gateway_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    match state.reconciler.process_webhook(&gateway_id, &body, &headers).await {
        Ok(()) => axum::http::StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(gateway = %gateway_id, error = %e, "webhook rejected");
            error_response(e)
        }
    }
}
