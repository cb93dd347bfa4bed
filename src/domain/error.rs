use crate::domain::donation::{ErrorEnvelope, ErrorPayload};
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DonationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("gateway transport failure: {0}")]
    Transport(String),
    #[error("webhook rejected: {0}")]
    Signature(#[from] WebhookError),
    #[error("reconciliation conflict: {0}")]
    ReconciliationConflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DonationError {
    pub fn status(&self) -> StatusCode {
        match self {
            DonationError::Validation(_) => StatusCode::BAD_REQUEST,
            DonationError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DonationError::Transport(_) => StatusCode::BAD_GATEWAY,
            DonationError::Signature(_) => StatusCode::BAD_REQUEST,
            DonationError::ReconciliationConflict(_) => StatusCode::CONFLICT,
            DonationError::NotFound(_) => StatusCode::NOT_FOUND,
            DonationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DonationError::Validation(_) => "VALIDATION_ERROR",
            DonationError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            DonationError::Transport(_) => "GATEWAY_TRANSPORT_ERROR",
            DonationError::Signature(_) => "SIGNATURE_VERIFICATION_FAILED",
            DonationError::ReconciliationConflict(_) => "RECONCILIATION_CONFLICT",
            DonationError::NotFound(_) => "NOT_FOUND",
            DonationError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Donors never see raw provider payloads or internal detail.
    pub fn public_message(&self) -> String {
        match self {
            DonationError::Validation(msg) => msg.clone(),
            DonationError::GatewayUnavailable(_) => {
                "the selected payment method is not available".to_string()
            }
            DonationError::Transport(_) => {
                "the payment could not be processed, please try again".to_string()
            }
            DonationError::Signature(_) => "signature verification failed".to_string(),
            DonationError::ReconciliationConflict(_) => "donation already finalized".to_string(),
            DonationError::NotFound(msg) => msg.clone(),
            DonationError::Internal(_) => "internal error".to_string(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorPayload {
                code: self.code().to_string(),
                message: self.public_message(),
                details: None,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("timestamp tolerance exceeded: {0}")]
    TimestampTolerance(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("webhook secret not configured")]
    MissingSecret,
    #[error("webhooks not supported by this gateway")]
    Unsupported,
}
