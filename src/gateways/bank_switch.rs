use crate::config::BankSwitchSettings;
use crate::domain::donation::DonationStatus;
use crate::domain::error::WebhookError;
use crate::gateways::{
    verify_hmac_sha256, ChargeOutcome, ChargeRequest, ChargeStatus, DonationGateway, FieldKind,
    FieldOption, PaymentField, PollOutcome, WebhookEvent,
};
use anyhow::{anyhow, Result};
use axum::http::HeaderMap;
use serde_json::json;
use std::time::Duration;

pub const BANKS: &[(&str, &str)] = &[
    ("cbz", "CBZ Bank"),
    ("fbc", "FBC Bank"),
    ("nmb", "NMB Bank"),
    ("stanbic", "Stanbic Bank"),
    ("steward", "Steward Bank"),
    ("zb", "ZB Bank"),
];

/// Bank-switch gateway: the payer picks their bank, is sent to a hosted page
/// run by the national switch, and completion lands via webhook or an
/// explicit status check keyed by the transaction reference.
pub struct BankSwitchGateway {
    pub settings: BankSwitchSettings,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl DonationGateway for BankSwitchGateway {
    fn id(&self) -> &str {
        "bank-switch"
    }

    fn label(&self) -> &str {
        "Bank Transfer (ZimSwitch)"
    }

    fn is_available(&self) -> bool {
        self.settings.enabled
            && !self.settings.merchant_id.is_empty()
            && !self.settings.api_key.is_empty()
    }

    fn payment_fields(&self) -> Vec<PaymentField> {
        vec![PaymentField {
            name: "bank_code",
            label: "Select your bank",
            kind: FieldKind::Select,
            required: true,
            options: BANKS
                .iter()
                .map(|(value, label)| FieldOption { value, label })
                .collect(),
        }]
    }

    async fn process_payment(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
        let Some(bank_code) = request.bank_code.as_deref() else {
            return Ok(ChargeOutcome::declined("a bank must be selected", serde_json::Value::Null));
        };
        if !BANKS.iter().any(|(code, _)| *code == bank_code) {
            return Ok(ChargeOutcome::declined(
                format!("unknown bank code: {bank_code}"),
                serde_json::Value::Null,
            ));
        }

        let body = json!({
            "merchant_id": self.settings.merchant_id,
            "reference": request.donation_id,
            "amount": request.amount.round_dp(2).to_string(),
            "currency": request.currency.to_ascii_uppercase(),
            "bank_code": bank_code,
            "return_url": self.settings.return_url,
        });

        let url = format!("{}/api/v1/transactions", self.settings.base_url);
        let resp = self
            .client
            .post(url)
            .header("X-Api-Key", &self.settings.api_key)
            .json(&body)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await;

        let reply: serde_json::Value = match resp {
            Ok(r) if r.status().is_success() => r.json().await.unwrap_or_default(),
            Ok(r) => {
                let status = r.status();
                let raw: serde_json::Value = r.json().await.unwrap_or_default();
                return Ok(ChargeOutcome::declined(
                    format!("bank switch returned HTTP {}", status.as_u16()),
                    raw,
                ));
            }
            Err(e) if e.is_timeout() => {
                return Ok(ChargeOutcome::declined("bank switch timeout", serde_json::Value::Null))
            }
            Err(e) => {
                return Ok(ChargeOutcome::declined(
                    format!("bank switch unreachable: {e}"),
                    serde_json::Value::Null,
                ))
            }
        };

        let transaction_ref = reply
            .get("transaction_ref")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let Some(redirect_url) = reply
            .get("redirect_url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            return Ok(ChargeOutcome::declined("bank switch reply missing redirect url", reply));
        };

        Ok(ChargeOutcome {
            approved: true,
            status: ChargeStatus::Pending,
            poll_handle: transaction_ref.clone(),
            transaction_id: transaction_ref,
            client_secret: None,
            redirect_url: Some(redirect_url),
            message: Some("redirect payer to their bank".to_string()),
            raw: reply,
        })
    }

    async fn check_status(&self, poll_handle: &str) -> Result<PollOutcome> {
        let url = format!("{}/api/v1/transactions/{}", self.settings.base_url, poll_handle);
        let resp = self
            .client
            .get(url)
            .header("X-Api-Key", &self.settings.api_key)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("status check failed: HTTP {}", resp.status().as_u16()));
        }
        let reply: serde_json::Value = resp.json().await?;
        let status = reply.get("status").and_then(|v| v.as_str()).unwrap_or("");

        Ok(PollOutcome {
            status: map_switch_status(status),
            transaction_id: Some(poll_handle.to_string()),
            message: Some(format!("switch status: {status}")),
            raw: reply,
        })
    }

    fn verify_webhook(&self, body: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, WebhookError> {
        let signature = crate::gateways::signature_header(headers, "x-signature")?;
        verify_hmac_sha256(&self.settings.api_secret, body, signature)?;

        let event: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(format!("json parse: {e}")))?;
        let donation_id = event
            .get("reference")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WebhookError::MalformedPayload("missing reference".to_string()))?
            .to_string();
        let status = event.get("status").and_then(|v| v.as_str()).unwrap_or("");

        Ok(WebhookEvent {
            donation_id,
            status: map_switch_status(status),
            transaction_id: event
                .get("transaction_ref")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw: event,
        })
    }
}

impl BankSwitchGateway {
    pub fn new(settings: BankSwitchSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }
}

pub fn map_switch_status(status: &str) -> DonationStatus {
    match status.to_ascii_lowercase().as_str() {
        "settled" | "paid" | "successful" => DonationStatus::Completed,
        "declined" | "cancelled" | "expired" | "timeout" => DonationStatus::Failed,
        _ => DonationStatus::Pending,
    }
}
