use crate::config::CardSettings;
use crate::domain::donation::{DonationStatus, RecurringInterval};
use crate::domain::error::WebhookError;
use crate::domain::money::{currency_decimals, format_amount, from_minor_units, to_minor_units};
use crate::gateways::{
    constant_time_eq, ChargeOutcome, ChargeRequest, ChargeStatus, DonationGateway, FieldKind,
    PaymentField, PollOutcome, WebhookEvent,
};
use anyhow::{anyhow, Result};
use axum::http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Card processor speaking a Stripe-style REST protocol: form-encoded bodies,
/// amounts in minor units, payment intents confirmed client-side via a client
/// secret, `t=...,v1=...` signed webhooks.
pub struct CardGateway {
    pub settings: CardSettings,
    pub client: reqwest::Client,
}

enum ProviderReply {
    Ok(serde_json::Value),
    Declined { message: String, raw: serde_json::Value },
}

#[async_trait::async_trait]
impl DonationGateway for CardGateway {
    fn id(&self) -> &str {
        "card"
    }

    fn label(&self) -> &str {
        "Credit / Debit Card"
    }

    fn is_available(&self) -> bool {
        self.settings.enabled
            && !self.settings.publishable_key.is_empty()
            && !self.settings.secret_key.is_empty()
    }

    fn payment_fields(&self) -> Vec<PaymentField> {
        // Card details are collected by the provider's browser widget; the
        // form only needs the billing name.
        vec![PaymentField {
            name: "cardholder_name",
            label: "Name on card",
            kind: FieldKind::Text,
            required: true,
            options: vec![],
        }]
    }

    async fn process_payment(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
        let decimals = currency_decimals(&request.currency);
        let minor = to_minor_units(request.amount, decimals)?;

        if request.is_recurring {
            return self.create_subscription(request, minor).await;
        }

        let form = vec![
            ("amount", minor.to_string()),
            ("currency", request.currency.to_ascii_lowercase()),
            ("receipt_email", request.donor_email.clone()),
            ("description", format!("Donation {}", request.donation_id)),
            ("metadata[donation_id]", request.donation_id.clone()),
        ];

        let intent = match self.post_form("/v1/payment_intents", &form).await {
            ProviderReply::Ok(v) => v,
            ProviderReply::Declined { message, raw } => return Ok(ChargeOutcome::declined(message, raw)),
        };

        let transaction_id = intent.get("id").and_then(|v| v.as_str()).map(str::to_string);
        let client_secret = intent
            .get("client_secret")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let status = match intent.get("status").and_then(|v| v.as_str()) {
            Some("succeeded") => ChargeStatus::Completed,
            _ => ChargeStatus::Pending,
        };

        Ok(ChargeOutcome {
            approved: true,
            status,
            poll_handle: transaction_id.clone(),
            transaction_id,
            client_secret,
            redirect_url: None,
            message: None,
            raw: intent,
        })
    }

    async fn check_status(&self, poll_handle: &str) -> Result<PollOutcome> {
        let url = format!("{}/v1/payment_intents/{}", self.settings.base_url, poll_handle);
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.settings.secret_key, None::<&str>)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("payment intent lookup failed: HTTP {}", resp.status().as_u16()));
        }

        let intent: serde_json::Value = resp.json().await?;
        let status = map_intent_status(intent.get("status").and_then(|v| v.as_str()).unwrap_or(""));
        let currency = intent.get("currency").and_then(|v| v.as_str()).unwrap_or("usd");
        let message = intent
            .get("amount")
            .and_then(|v| v.as_i64())
            .map(|minor| {
                let amount = from_minor_units(minor, currency_decimals(currency));
                format!("payment intent {} for {}", status.as_str(), format_amount(amount, currency))
            });

        Ok(PollOutcome {
            status,
            transaction_id: intent.get("id").and_then(|v| v.as_str()).map(str::to_string),
            message,
            raw: intent,
        })
    }

    fn verify_webhook(&self, body: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, WebhookError> {
        let header = crate::gateways::signature_header(headers, "stripe-signature")?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| WebhookError::InvalidSignature(format!("system time: {e}")))?
            .as_secs() as i64;
        verify_signature_at(
            body,
            header,
            &self.settings.webhook_secret,
            self.settings.webhook_tolerance_secs,
            now,
        )?;

        let event: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedPayload(format!("json parse: {e}")))?;
        let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let object = event
            .pointer("/data/object")
            .ok_or_else(|| WebhookError::MalformedPayload("missing data.object".to_string()))?;
        let donation_id = object
            .pointer("/metadata/donation_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WebhookError::MalformedPayload("missing donation_id metadata".to_string()))?
            .to_string();

        Ok(WebhookEvent {
            donation_id,
            status: map_event_type(event_type),
            transaction_id: object.get("id").and_then(|v| v.as_str()).map(str::to_string),
            raw: event,
        })
    }
}

impl CardGateway {
    pub fn new(settings: CardSettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }

    /// Recurring donations need the provider's three-step protocol: customer,
    /// price scoped to amount+interval, then subscription. The first charge is
    /// still driven by the client secret of the subscription's initial intent.
    async fn create_subscription(&self, request: &ChargeRequest, minor: i64) -> Result<ChargeOutcome> {
        let customer_form = vec![
            ("email", request.donor_email.clone()),
            ("name", request.donor_name.clone()),
            ("metadata[donation_id]", request.donation_id.clone()),
        ];
        let customer = match self.post_form("/v1/customers", &customer_form).await {
            ProviderReply::Ok(v) => v,
            ProviderReply::Declined { message, raw } => return Ok(ChargeOutcome::declined(message, raw)),
        };
        let customer_id = customer
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("customer response missing id"))?
            .to_string();

        let interval = request.recurring_interval.unwrap_or(RecurringInterval::Month);
        let (unit, count) = billing_interval(interval);
        let price_form = vec![
            ("unit_amount", minor.to_string()),
            ("currency", request.currency.to_ascii_lowercase()),
            ("recurring[interval]", unit.to_string()),
            ("recurring[interval_count]", count.to_string()),
            ("product_data[name]", format!("Recurring donation {}", request.donation_id)),
        ];
        let price = match self.post_form("/v1/prices", &price_form).await {
            ProviderReply::Ok(v) => v,
            ProviderReply::Declined { message, raw } => return Ok(ChargeOutcome::declined(message, raw)),
        };
        let price_id = price
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("price response missing id"))?
            .to_string();

        let subscription_form = vec![
            ("customer", customer_id),
            ("items[0][price]", price_id),
            ("payment_behavior", "default_incomplete".to_string()),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
            ("metadata[donation_id]", request.donation_id.clone()),
        ];
        let subscription = match self.post_form("/v1/subscriptions", &subscription_form).await {
            ProviderReply::Ok(v) => v,
            ProviderReply::Declined { message, raw } => return Ok(ChargeOutcome::declined(message, raw)),
        };

        let intent = subscription
            .pointer("/latest_invoice/payment_intent")
            .cloned()
            .unwrap_or_default();

        Ok(ChargeOutcome {
            approved: true,
            status: ChargeStatus::Pending,
            transaction_id: intent.get("id").and_then(|v| v.as_str()).map(str::to_string),
            client_secret: intent
                .get("client_secret")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            redirect_url: None,
            poll_handle: intent.get("id").and_then(|v| v.as_str()).map(str::to_string),
            message: None,
            raw: subscription,
        })
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> ProviderReply {
        let url = format!("{}{}", self.settings.base_url, path);
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.settings.secret_key, None::<&str>)
            .form(form)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                ProviderReply::Ok(r.json().await.unwrap_or_default())
            }
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                let raw = serde_json::from_str(&body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.chars().take(500).collect()));
                let message = raw
                    .pointer("/error/message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("card provider returned HTTP {}", status.as_u16()));
                ProviderReply::Declined { message, raw }
            }
            Err(e) if e.is_timeout() => ProviderReply::Declined {
                message: "card provider timeout".to_string(),
                raw: serde_json::Value::Null,
            },
            Err(e) => ProviderReply::Declined {
                message: format!("card provider unreachable: {e}"),
                raw: serde_json::Value::Null,
            },
        }
    }
}

/// Maps the provider's intent vocabulary to donation statuses. Anything not
/// explicitly terminal stays pending.
pub fn map_intent_status(status: &str) -> DonationStatus {
    match status {
        "succeeded" => DonationStatus::Completed,
        "canceled" => DonationStatus::Failed,
        _ => DonationStatus::Pending,
    }
}

pub fn map_event_type(event_type: &str) -> DonationStatus {
    match event_type {
        "payment_intent.succeeded" => DonationStatus::Completed,
        "payment_intent.payment_failed" | "payment_intent.canceled" => DonationStatus::Failed,
        _ => DonationStatus::Pending,
    }
}

fn billing_interval(interval: RecurringInterval) -> (&'static str, u32) {
    match interval {
        RecurringInterval::Day => ("day", 1),
        RecurringInterval::Week => ("week", 1),
        RecurringInterval::Month => ("month", 1),
        RecurringInterval::Quarter => ("month", 3),
        RecurringInterval::Year => ("year", 1),
    }
}

/// Verifies a `t=<unix>,v1=<hex>` signature header: the HMAC-SHA256 of
/// `"{timestamp}.{body}"` under the shared secret, with a replay window.
pub fn verify_signature_at(
    body: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), WebhookError> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| WebhookError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature("no v1 signature".to_string()));
    }

    let drift = (now_unix - timestamp).abs();
    if drift > tolerance_secs {
        return Err(WebhookError::TimestampTolerance(format!(
            "timestamp {timestamp} is {drift}s from now (tolerance {tolerance_secs}s)"
        )));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(format!("hmac init: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if !signatures
        .iter()
        .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes()))
    {
        return Err(WebhookError::InvalidSignature("signature mismatch".to_string()));
    }
    Ok(())
}
