use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

impl DonationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DonationStatus::Completed | DonationStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Completed => "completed",
            DonationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => DonationStatus::Completed,
            "failed" => DonationStatus::Failed,
            _ => DonationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    Apply,
    AlreadyApplied,
    Conflict,
}

/// Terminal statuses are sticky: once a donation is completed or failed, only
/// an identical repeat is accepted. Everything else is a conflict that must be
/// logged and dropped, never overwritten.
pub fn decide_transition(current: DonationStatus, incoming: DonationStatus) -> TransitionDecision {
    if !incoming.is_terminal() {
        return TransitionDecision::AlreadyApplied;
    }
    match current {
        DonationStatus::Pending => TransitionDecision::Apply,
        _ if current == incoming => TransitionDecision::AlreadyApplied,
        _ => TransitionDecision::Conflict,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringInterval {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl RecurringInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringInterval::Day => "day",
            RecurringInterval::Week => "week",
            RecurringInterval::Month => "month",
            RecurringInterval::Quarter => "quarter",
            RecurringInterval::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateDonationRequest {
    pub donation_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub gateway: String,
    pub campaign_id: Option<Uuid>,
    pub form_id: Option<String>,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub donor_message: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurring_interval: Option<RecurringInterval>,
    #[serde(default)]
    pub anonymous: bool,
    pub bank_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDonationResponse {
    pub donation_id: String,
    pub status: DonationStatus,
    pub transaction_id: Option<String>,
    pub redirect_url: Option<String>,
    pub client_secret: Option<String>,
    pub poll_handle: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub donation_id: String,
    pub status: DonationStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}
