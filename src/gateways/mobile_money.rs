use crate::config::MobileMoneySettings;
use crate::domain::donation::DonationStatus;
use crate::domain::error::WebhookError;
use crate::gateways::{
    constant_time_eq, ChargeOutcome, ChargeRequest, ChargeStatus, DonationGateway, FieldKind,
    PaymentField, PollOutcome, WebhookEvent,
};
use anyhow::{anyhow, bail, Result};
use axum::http::HeaderMap;
use sha2::{Digest, Sha512};
use std::time::Duration;

const COUNTRY_CODE: &str = "263";

/// Mobile-money gateway speaking the Paynow wire protocol: url-encoded
/// key/value bodies, an ordered SHA-512 integrity hash over every field plus
/// the integration key, and a poll URL the caller re-fetches until the payer
/// confirms the prompt on their handset.
pub struct MobileMoneyGateway {
    pub settings: MobileMoneySettings,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl DonationGateway for MobileMoneyGateway {
    fn id(&self) -> &str {
        "mobile-money"
    }

    fn label(&self) -> &str {
        "Mobile Money (EcoCash)"
    }

    fn is_available(&self) -> bool {
        self.settings.enabled
            && !self.settings.integration_id.is_empty()
            && !self.settings.integration_key.is_empty()
    }

    fn payment_fields(&self) -> Vec<PaymentField> {
        vec![PaymentField {
            name: "phone",
            label: "EcoCash phone number",
            kind: FieldKind::Phone,
            required: true,
            options: vec![],
        }]
    }

    async fn process_payment(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
        let Some(raw_phone) = request.donor_phone.as_deref() else {
            return Ok(ChargeOutcome::declined(
                "a mobile money phone number is required",
                serde_json::Value::Null,
            ));
        };
        let phone = match normalize_phone(raw_phone) {
            Ok(p) => p,
            Err(e) => return Ok(ChargeOutcome::declined(e.to_string(), serde_json::Value::Null)),
        };

        // Field order is part of the provider's hash algorithm and must match
        // the order the fields are transmitted in.
        let fields: Vec<(&str, String)> = vec![
            ("id", self.settings.integration_id.clone()),
            ("reference", request.donation_id.clone()),
            ("amount", request.amount.round_dp(2).to_string()),
            ("additionalinfo", format!("Donation {}", request.donation_id)),
            ("returnurl", self.settings.return_url.clone()),
            ("resulturl", self.settings.result_url.clone()),
            ("authemail", request.donor_email.clone()),
            ("phone", phone),
            ("method", "ecocash".to_string()),
            ("status", "Message".to_string()),
        ];
        let hash = integrity_hash(
            fields.iter().map(|(_, v)| v.as_str()),
            &self.settings.integration_key,
        );

        let mut form: Vec<(&str, String)> = fields;
        form.push(("hash", hash));

        let url = format!("{}/interface/remotetransaction", self.settings.base_url);
        let resp = self
            .client
            .post(url)
            .form(&form)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await;

        let body = match resp {
            Ok(r) if r.status().is_success() => r.text().await.unwrap_or_default(),
            Ok(r) => {
                return Ok(ChargeOutcome::declined(
                    format!("mobile money provider returned HTTP {}", r.status().as_u16()),
                    serde_json::Value::Null,
                ))
            }
            Err(e) if e.is_timeout() => {
                return Ok(ChargeOutcome::declined("mobile money provider timeout", serde_json::Value::Null))
            }
            Err(e) => {
                return Ok(ChargeOutcome::declined(
                    format!("mobile money provider unreachable: {e}"),
                    serde_json::Value::Null,
                ))
            }
        };

        let reply = parse_initiate_reply(&body);
        let raw = pairs_to_json(&parse_pairs(&body));

        if !reply.status.eq_ignore_ascii_case("ok") {
            let message = reply.error.unwrap_or_else(|| "mobile money request rejected".to_string());
            return Ok(ChargeOutcome::declined(message, raw));
        }
        let Some(poll_url) = reply.poll_url else {
            return Ok(ChargeOutcome::declined("provider reply missing poll url", raw));
        };

        Ok(ChargeOutcome {
            approved: true,
            status: ChargeStatus::Pending,
            transaction_id: None,
            client_secret: None,
            redirect_url: reply.browser_url,
            poll_handle: Some(poll_url),
            message: Some("payment prompt sent to handset".to_string()),
            raw,
        })
    }

    async fn check_status(&self, poll_handle: &str) -> Result<PollOutcome> {
        let resp = self
            .client
            .get(poll_handle)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("poll url returned HTTP {}", resp.status().as_u16()));
        }
        let body = resp.text().await?;
        let pairs = parse_pairs(&body);
        verify_reply_hash(&pairs, &self.settings.integration_key)
            .map_err(|e| anyhow!("poll reply rejected: {e}"))?;

        let reply = status_reply_from_pairs(&pairs);
        Ok(PollOutcome {
            status: map_poll_status(&reply.status),
            transaction_id: reply.provider_reference,
            message: Some(format!("provider status: {}", reply.status)),
            raw: pairs_to_json(&pairs),
        })
    }

    fn verify_webhook(&self, body: &[u8], _headers: &HeaderMap) -> Result<WebhookEvent, WebhookError> {
        if self.settings.integration_key.is_empty() {
            return Err(WebhookError::MissingSecret);
        }
        let body = std::str::from_utf8(body)
            .map_err(|e| WebhookError::MalformedPayload(format!("not utf-8: {e}")))?;
        let pairs = parse_pairs(body);
        verify_reply_hash(&pairs, &self.settings.integration_key)?;

        let reply = status_reply_from_pairs(&pairs);
        let donation_id = reply
            .reference
            .ok_or_else(|| WebhookError::MalformedPayload("missing reference".to_string()))?;

        Ok(WebhookEvent {
            donation_id,
            status: map_poll_status(&reply.status),
            transaction_id: reply.provider_reference,
            raw: pairs_to_json(&pairs),
        })
    }
}

impl MobileMoneyGateway {
    pub fn new(settings: MobileMoneySettings, client: reqwest::Client) -> Self {
        Self { settings, client }
    }
}

/// Normalizes a Zimbabwean subscriber number to international form:
/// 9 digits get the country code prefixed, 10 digits with a leading trunk
/// zero have the zero replaced by the country code.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        9 => Ok(format!("{COUNTRY_CODE}{digits}")),
        10 if digits.starts_with('0') => Ok(format!("{COUNTRY_CODE}{}", &digits[1..])),
        12 if digits.starts_with(COUNTRY_CODE) => Ok(digits),
        _ => bail!("unrecognized phone number format: {raw}"),
    }
}

/// The provider's integrity hash: all field values concatenated in
/// transmission order, then the integration key, SHA-512, uppercase hex.
/// Order is significant; this is an explicit ordered reduction, never a map
/// iteration.
pub fn integrity_hash<'a>(values: impl Iterator<Item = &'a str>, integration_key: &str) -> String {
    let mut hasher = Sha512::new();
    for value in values {
        hasher.update(value.as_bytes());
    }
    hasher.update(integration_key.as_bytes());
    hex::encode(hasher.finalize()).to_uppercase()
}

/// Checks the hash field of an inbound reply against the remaining fields in
/// the order they were received.
pub fn verify_reply_hash(pairs: &[(String, String)], integration_key: &str) -> Result<(), WebhookError> {
    let provided = pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("hash"))
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| WebhookError::MalformedPayload("missing hash field".to_string()))?;
    let expected = integrity_hash(
        pairs
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("hash"))
            .map(|(_, v)| v.as_str()),
        integration_key,
    );
    if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        return Err(WebhookError::InvalidSignature("hash mismatch".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct InitiateReply {
    pub status: String,
    pub poll_url: Option<String>,
    pub browser_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StatusReply {
    pub status: String,
    pub reference: Option<String>,
    pub provider_reference: Option<String>,
    pub amount: Option<String>,
}

/// Single point of truth for the initiate-transaction wire format.
pub fn parse_initiate_reply(body: &str) -> InitiateReply {
    let mut reply = InitiateReply::default();
    for (key, value) in parse_pairs(body) {
        match key.to_ascii_lowercase().as_str() {
            "status" => reply.status = value,
            "pollurl" => reply.poll_url = Some(value),
            "browserurl" => reply.browser_url = Some(value),
            "error" => reply.error = Some(value),
            _ => {}
        }
    }
    reply
}

pub fn status_reply_from_pairs(pairs: &[(String, String)]) -> StatusReply {
    let mut reply = StatusReply::default();
    for (key, value) in pairs {
        match key.to_ascii_lowercase().as_str() {
            "status" => reply.status = value.clone(),
            "reference" => reply.reference = Some(value.clone()),
            "paynowreference" => reply.provider_reference = Some(value.clone()),
            "amount" => reply.amount = Some(value.clone()),
            _ => {}
        }
    }
    reply
}

/// Provider status vocabulary mapped to donation statuses. Unknown values
/// stay pending so a later poll can settle them.
pub fn map_poll_status(status: &str) -> DonationStatus {
    match status.to_ascii_lowercase().as_str() {
        "paid" | "awaiting delivery" | "delivered" => DonationStatus::Completed,
        "cancelled" | "failed" | "refunded" => DonationStatus::Failed,
        _ => DonationStatus::Pending,
    }
}

/// Parses a url-encoded reply line into key/value pairs, preserving the order
/// they were transmitted in (the hash depends on it).
pub fn parse_pairs(body: &str) -> Vec<(String, String)> {
    body.trim()
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (urldecode(k), urldecode(v)),
            None => (urldecode(part), String::new()),
        })
        .collect()
}

fn pairs_to_json(pairs: &[(String, String)]) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map)
}

pub fn urldecode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
