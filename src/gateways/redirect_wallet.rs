use crate::config::WalletSettings;
use crate::domain::donation::DonationStatus;
use crate::domain::error::WebhookError;
use crate::gateways::{
    verify_hmac_sha256, ChargeOutcome, ChargeRequest, ChargeStatus, DonationGateway, PaymentField,
    PollOutcome, WebhookEvent,
};
use anyhow::{anyhow, Result};
use axum::http::HeaderMap;
use serde_json::json;
use std::time::Duration;

/// Hosted-wallet gateway with a PayPal-style redirect flow: create an order,
/// send the payer to the approval link, capture after they return. The order
/// id doubles as the poll handle.
pub struct RedirectWalletGateway {
    pub settings: WalletSettings,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl DonationGateway for RedirectWalletGateway {
    fn id(&self) -> &str {
        "wallet"
    }

    fn label(&self) -> &str {
        "PayPal"
    }

    fn is_available(&self) -> bool {
        self.settings.enabled
            && !self.settings.client_id.is_empty()
            && !self.settings.client_secret.is_empty()
    }

    fn payment_fields(&self) -> Vec<PaymentField> {
        // Everything is collected on the provider's hosted page.
        vec![]
    }

    async fn process_payment(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
        let token = match self.access_token().await {
            Ok(t) => t,
            Err(e) => {
                return Ok(ChargeOutcome::declined(
                    format!("wallet authentication failed: {e}"),
                    serde_json::Value::Null,
                ))
            }
        };

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.donation_id,
                "custom_id": request.donation_id,
                "amount": {
                    "currency_code": request.currency.to_ascii_uppercase(),
                    "value": request.amount.round_dp(2).to_string(),
                },
            }],
            "application_context": {
                "return_url": self.settings.return_url,
                "cancel_url": self.settings.cancel_url,
            },
        });

        let url = format!("{}/v2/checkout/orders", self.settings.base_url);
        let resp = self
            .client
            .post(url)
            .bearer_auth(&token)
            .json(&body)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await;

        let order: serde_json::Value = match resp {
            Ok(r) if r.status().is_success() => r.json().await.unwrap_or_default(),
            Ok(r) => {
                let status = r.status();
                let raw: serde_json::Value = r.json().await.unwrap_or_default();
                return Ok(ChargeOutcome::declined(
                    format!("wallet provider returned HTTP {}", status.as_u16()),
                    raw,
                ));
            }
            Err(e) if e.is_timeout() => {
                return Ok(ChargeOutcome::declined("wallet provider timeout", serde_json::Value::Null))
            }
            Err(e) => {
                return Ok(ChargeOutcome::declined(
                    format!("wallet provider unreachable: {e}"),
                    serde_json::Value::Null,
                ))
            }
        };

        let order_id = order.get("id").and_then(|v| v.as_str()).map(str::to_string);
        let approval = approval_link(&order);
        let Some(redirect_url) = approval else {
            return Ok(ChargeOutcome::declined("wallet order missing approval link", order));
        };

        Ok(ChargeOutcome {
            approved: true,
            status: ChargeStatus::Pending,
            poll_handle: order_id.clone(),
            transaction_id: order_id,
            client_secret: None,
            redirect_url: Some(redirect_url),
            message: Some("redirect payer to wallet approval page".to_string()),
            raw: order,
        })
    }

    async fn check_status(&self, poll_handle: &str) -> Result<PollOutcome> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/checkout/orders/{}", self.settings.base_url, poll_handle);
        let resp = self
            .client
            .get(url)
            .bearer_auth(&token)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("order lookup failed: HTTP {}", resp.status().as_u16()));
        }
        let order: serde_json::Value = resp.json().await?;
        let order_status = order.get("status").and_then(|v| v.as_str()).unwrap_or("");

        // An approved order still needs an explicit capture before the money
        // moves; do it here so polling after the payer returns settles it.
        if order_status == "APPROVED" {
            let captured = self.capture(&token, poll_handle).await?;
            let capture_status = captured.get("status").and_then(|v| v.as_str()).unwrap_or("");
            return Ok(PollOutcome {
                status: map_order_status(capture_status),
                transaction_id: Some(poll_handle.to_string()),
                message: Some(format!("capture status: {capture_status}")),
                raw: captured,
            });
        }

        Ok(PollOutcome {
            status: map_order_status(order_status),
            transaction_id: Some(poll_handle.to_string()),
            message: Some(format!("order status: {order_status}")),
            raw: order,
        })
    }

    fn verify_webhook(&self, body: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, WebhookError> {
        let signature = crate::gateways::signature_header(headers, "x-webhook-signature")?;
        verify_hmac_sha256(&self.settings.webhook_secret, body, signature)?;

        let event: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(format!("json parse: {e}")))?;
        let event_type = event.get("event_type").and_then(|v| v.as_str()).unwrap_or("");
        let donation_id = event
            .pointer("/resource/custom_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WebhookError::MalformedPayload("missing resource.custom_id".to_string()))?
            .to_string();

        Ok(WebhookEvent {
            donation_id,
            status: map_event_type(event_type),
            transaction_id: event
                .pointer("/resource/id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw: event,
        })
    }
}

impl RedirectWalletGateway {
    pub fn new(settings: WalletSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    async fn access_token(&self) -> Result<String> {
        let url = format!("{}/v1/oauth2/token", self.settings.base_url);
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("token request failed: HTTP {}", resp.status().as_u16()));
        }
        let body: serde_json::Value = resp.json().await?;
        body.get("access_token")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("token response missing access_token"))
    }

    async fn capture(&self, token: &str, order_id: &str) -> Result<serde_json::Value> {
        let url = format!("{}/v2/checkout/orders/{}/capture", self.settings.base_url, order_id);
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("capture failed: HTTP {}", resp.status().as_u16()));
        }
        Ok(resp.json().await?)
    }
}

/// The approval link is the one whose relation is "approve" (or
/// "payer-action" on newer API versions).
pub fn approval_link(order: &serde_json::Value) -> Option<String> {
    order.get("links")?.as_array()?.iter().find_map(|link| {
        let rel = link.get("rel")?.as_str()?;
        if rel == "approve" || rel == "payer-action" {
            link.get("href")?.as_str().map(str::to_string)
        } else {
            None
        }
    })
}

pub fn map_order_status(status: &str) -> DonationStatus {
    match status {
        "COMPLETED" => DonationStatus::Completed,
        "VOIDED" => DonationStatus::Failed,
        _ => DonationStatus::Pending,
    }
}

pub fn map_event_type(event_type: &str) -> DonationStatus {
    match event_type {
        "PAYMENT.CAPTURE.COMPLETED" => DonationStatus::Completed,
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.REVERSED" => DonationStatus::Failed,
        _ => DonationStatus::Pending,
    }
}
