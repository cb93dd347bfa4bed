use crate::domain::donation::{DonationStatus, RecurringInterval};
use crate::domain::error::WebhookError;
use anyhow::Result;
use axum::http::HeaderMap;
use rust_decimal::Decimal;
use serde::Serialize;

pub mod bank_switch;
pub mod card;
pub mod mobile_money;
pub mod mock;
pub mod redirect_wallet;
pub mod registry;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub donation_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub is_recurring: bool,
    pub recurring_interval: Option<RecurringInterval>,
    pub bank_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Completed,
    Pending,
}

/// Normalized outcome of one provider call. Untyped provider maps never leave
/// the adapter; the raw body is kept only as an audit blob on the donation row.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub approved: bool,
    pub status: ChargeStatus,
    pub transaction_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub poll_handle: Option<String>,
    pub message: Option<String>,
    pub raw: serde_json::Value,
}

impl ChargeOutcome {
    pub fn declined(message: impl Into<String>, raw: serde_json::Value) -> Self {
        Self {
            approved: false,
            status: ChargeStatus::Pending,
            transaction_id: None,
            client_secret: None,
            redirect_url: None,
            poll_handle: None,
            message: Some(message.into()),
            raw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub status: DonationStatus,
    pub transaction_id: Option<String>,
    pub message: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub donation_id: String,
    pub status: DonationStatus,
    pub transaction_id: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Phone,
    Select,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Descriptor for one input the payment form must collect before the adapter
/// can process a charge.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub options: Vec<FieldOption>,
}

#[async_trait::async_trait]
pub trait DonationGateway: Send + Sync {
    fn id(&self) -> &str;

    fn label(&self) -> &str;

    /// Pure function of configuration: enabled flag plus all required
    /// credentials present. Never performs a network call.
    fn is_available(&self) -> bool;

    fn payment_fields(&self) -> Vec<PaymentField>;

    /// Exactly one outbound provider call per invocation. The donation id is
    /// passed as the provider-side reference so retries stay idempotent.
    async fn process_payment(&self, request: &ChargeRequest) -> Result<ChargeOutcome>;

    async fn check_status(&self, poll_handle: &str) -> Result<PollOutcome>;

    fn verify_webhook(&self, body: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, WebhookError>;
}

/// Constant-time comparison of a provided hex signature against the expected
/// HMAC-SHA256 of the raw body.
pub(crate) fn verify_hmac_sha256(secret: &str, body: &[u8], provided: &str) -> Result<(), WebhookError> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(format!("hmac init: {e}")))?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        return Err(WebhookError::InvalidSignature("signature mismatch".to_string()));
    }
    Ok(())
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub(crate) fn signature_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .ok_or(WebhookError::MissingSignature)?
        .to_str()
        .map_err(|e| WebhookError::InvalidSignature(format!("bad header encoding: {e}")))
}
