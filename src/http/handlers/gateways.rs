use crate::gateways::PaymentField;
use crate::AppState;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct GatewayDescriptor {
    pub id: String,
    pub label: String,
    pub fields: Vec<PaymentField>,
}

/// Gateways a donor can currently be offered: enabled and fully configured,
/// in the configured order.
pub async fn list_gateways(State(state): State<AppState>) -> impl IntoResponse {
    let gateways: Vec<GatewayDescriptor> = state
        .registry
        .available()
        .into_iter()
        .map(|g| GatewayDescriptor {
            id: g.id().to_string(),
            label: g.label().to_string(),
            fields: g.payment_fields(),
        })
        .collect();
    (axum::http::StatusCode::OK, Json(gateways))
}
