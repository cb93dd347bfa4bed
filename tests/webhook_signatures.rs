use axum::http::HeaderMap;
use donations_gateway::config::{BankSwitchSettings, WalletSettings};
use donations_gateway::domain::donation::DonationStatus;
use donations_gateway::domain::error::WebhookError;
use donations_gateway::gateways::bank_switch::BankSwitchGateway;
use donations_gateway::gateways::card::verify_signature_at;
use donations_gateway::gateways::redirect_wallet::RedirectWalletGateway;
use donations_gateway::gateways::DonationGateway;
use hmac::{Hmac, Mac};
use sha2::Sha256;

const SECRET: &str = "whsec_test_secret";
const NOW: i64 = 1_700_000_000;
const TOLERANCE: i64 = 300;

#[test]
fn accepts_a_correctly_signed_card_payload() {
    let body = br#"{"type":"payment_intent.succeeded"}"#;
    let header = signed_header(body, NOW);
    assert!(verify_signature_at(body, &header, SECRET, TOLERANCE, NOW).is_ok());
}

#[test]
fn rejects_a_tampered_card_payload() {
    let header = signed_header(br#"{"amount":100}"#, NOW);
    let result = verify_signature_at(br#"{"amount":999}"#, &header, SECRET, TOLERANCE, NOW);
    assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
}

#[test]
fn rejects_a_stale_timestamp() {
    let body = b"{}";
    let header = signed_header(body, NOW - TOLERANCE - 1);
    let result = verify_signature_at(body, &header, SECRET, TOLERANCE, NOW);
    assert!(matches!(result, Err(WebhookError::TimestampTolerance(_))));
}

#[test]
fn accepts_within_the_tolerance_window() {
    let body = b"{}";
    let header = signed_header(body, NOW - TOLERANCE);
    assert!(verify_signature_at(body, &header, SECRET, TOLERANCE, NOW).is_ok());
}

#[test]
fn rejects_when_no_secret_is_configured() {
    let body = b"{}";
    let header = signed_header(body, NOW);
    let result = verify_signature_at(body, &header, "", TOLERANCE, NOW);
    assert!(matches!(result, Err(WebhookError::MissingSecret)));
}

#[test]
fn rejects_a_header_without_signature_parts() {
    let result = verify_signature_at(b"{}", "t=123", SECRET, TOLERANCE, NOW);
    assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
    let result = verify_signature_at(b"{}", "v1=abc", SECRET, TOLERANCE, NOW);
    assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
}

#[test]
fn any_matching_v1_signature_is_enough() {
    let body = b"{}";
    let good = signed_header(body, NOW);
    let header = format!("{good},v1=deadbeef");
    assert!(verify_signature_at(body, &header, SECRET, TOLERANCE, NOW).is_ok());
}

#[test]
fn wallet_webhook_verifies_and_maps() {
    let gateway = wallet_gateway();
    let body = br#"{"event_type":"PAYMENT.CAPTURE.COMPLETED","resource":{"id":"cap_1","custom_id":"don_42"}}"#;
    let mut headers = HeaderMap::new();
    headers.insert("x-webhook-signature", hex_hmac("hooksecret", body).parse().unwrap());

    let event = gateway.verify_webhook(body, &headers).unwrap();
    assert_eq!(event.donation_id, "don_42");
    assert_eq!(event.status, DonationStatus::Completed);
    assert_eq!(event.transaction_id.as_deref(), Some("cap_1"));
}

#[test]
fn wallet_webhook_rejects_wrong_signature() {
    let gateway = wallet_gateway();
    let body = br#"{"event_type":"PAYMENT.CAPTURE.COMPLETED","resource":{"custom_id":"don_42"}}"#;
    let mut headers = HeaderMap::new();
    headers.insert("x-webhook-signature", hex_hmac("other-secret", body).parse().unwrap());

    assert!(matches!(
        gateway.verify_webhook(body, &headers),
        Err(WebhookError::InvalidSignature(_))
    ));
}

#[test]
fn wallet_webhook_requires_the_header() {
    let gateway = wallet_gateway();
    let body = br#"{"event_type":"PAYMENT.CAPTURE.COMPLETED"}"#;
    assert!(matches!(
        gateway.verify_webhook(body, &HeaderMap::new()),
        Err(WebhookError::MissingSignature)
    ));
}

#[test]
fn bank_webhook_verifies_and_maps() {
    let gateway = bank_gateway();
    let body = br#"{"reference":"don_7","status":"settled","transaction_ref":"zs_991"}"#;
    let mut headers = HeaderMap::new();
    headers.insert("x-signature", hex_hmac("apisecret", body).parse().unwrap());

    let event = gateway.verify_webhook(body, &headers).unwrap();
    assert_eq!(event.donation_id, "don_7");
    assert_eq!(event.status, DonationStatus::Completed);
    assert_eq!(event.transaction_id.as_deref(), Some("zs_991"));
}

#[test]
fn bank_webhook_without_reference_is_malformed() {
    let gateway = bank_gateway();
    let body = br#"{"status":"settled"}"#;
    let mut headers = HeaderMap::new();
    headers.insert("x-signature", hex_hmac("apisecret", body).parse().unwrap());

    assert!(matches!(
        gateway.verify_webhook(body, &headers),
        Err(WebhookError::MalformedPayload(_))
    ));
}

fn signed_header(body: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn hex_hmac(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn wallet_gateway() -> RedirectWalletGateway {
    RedirectWalletGateway::new(
        WalletSettings {
            enabled: true,
            base_url: "https://wallet.test".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            webhook_secret: "hooksecret".to_string(),
            return_url: "https://localhost/return".to_string(),
            cancel_url: "https://localhost/cancel".to_string(),
            timeout_secs: 5,
        },
        reqwest::Client::new(),
    )
}

fn bank_gateway() -> BankSwitchGateway {
    BankSwitchGateway::new(
        BankSwitchSettings {
            enabled: true,
            base_url: "https://bank.test".to_string(),
            merchant_id: "merchant".to_string(),
            api_key: "apikey".to_string(),
            api_secret: "apisecret".to_string(),
            return_url: "https://localhost/return".to_string(),
            timeout_secs: 5,
        },
        reqwest::Client::new(),
    )
}
