use crate::domain::donation::DonationStatus;
use crate::domain::error::WebhookError;
use crate::gateways::{
    ChargeOutcome, ChargeRequest, ChargeStatus, DonationGateway, PaymentField, PollOutcome,
    WebhookEvent,
};
use anyhow::Result;
use axum::http::HeaderMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Scriptable gateway for tests and local development. Each dispatch issues a
/// distinct poll handle, like providers that open a fresh transaction per
/// initiate call.
#[derive(Default)]
pub struct MockGateway {
    pub gateway_id: String,
    pub available: bool,
    pub behavior: String,
    pub dispatches: AtomicU32,
}

#[async_trait::async_trait]
impl DonationGateway for MockGateway {
    fn id(&self) -> &str {
        &self.gateway_id
    }

    fn label(&self) -> &str {
        "Mock"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn payment_fields(&self) -> Vec<PaymentField> {
        vec![]
    }

    async fn process_payment(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
        let attempt = self.dispatches.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = match self.behavior.as_str() {
            "ALWAYS_DECLINE" => ChargeOutcome::declined("mock decline", serde_json::Value::Null),
            "ALWAYS_COMPLETE" => ChargeOutcome {
                approved: true,
                status: ChargeStatus::Completed,
                transaction_id: Some(format!("mock_txn_{}", request.donation_id)),
                client_secret: None,
                redirect_url: None,
                poll_handle: None,
                message: None,
                raw: serde_json::Value::Null,
            },
            _ => ChargeOutcome {
                approved: true,
                status: ChargeStatus::Pending,
                transaction_id: None,
                client_secret: None,
                redirect_url: None,
                poll_handle: Some(format!("mock_poll_{}_{attempt}", request.donation_id)),
                message: Some("mock pending".to_string()),
                raw: serde_json::Value::Null,
            },
        };
        Ok(outcome)
    }

    async fn check_status(&self, poll_handle: &str) -> Result<PollOutcome> {
        let status = match self.behavior.as_str() {
            "POLL_PAID" => DonationStatus::Completed,
            "POLL_CANCELLED" => DonationStatus::Failed,
            _ => DonationStatus::Pending,
        };
        Ok(PollOutcome {
            status,
            transaction_id: Some(poll_handle.to_string()),
            message: Some("mock poll".to_string()),
            raw: serde_json::Value::Null,
        })
    }

    /// With behavior `WEBHOOKS` the payload is trusted JSON carrying
    /// `donation_id` and `status`; anything else reports webhooks as
    /// unsupported.
    fn verify_webhook(&self, body: &[u8], _headers: &HeaderMap) -> Result<WebhookEvent, WebhookError> {
        if self.behavior != "WEBHOOKS" {
            return Err(WebhookError::Unsupported);
        }
        let event: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(format!("json parse: {e}")))?;
        let donation_id = event
            .get("donation_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WebhookError::MalformedPayload("missing donation_id".to_string()))?
            .to_string();
        let status = DonationStatus::parse(event.get("status").and_then(|v| v.as_str()).unwrap_or(""));

        Ok(WebhookEvent {
            donation_id,
            status,
            transaction_id: event
                .get("transaction_id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw: event,
        })
    }
}
