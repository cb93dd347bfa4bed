use crate::config::GatewaySettings;
use crate::domain::donation::{CreateDonationRequest, CreateDonationResponse, DonationStatus};
use crate::domain::error::DonationError;
use crate::gateways::registry::GatewayRegistry;
use crate::gateways::{ChargeOutcome, ChargeRequest, ChargeStatus};
use crate::repo::donations_repo::{DonationRecord, NewDonation};
use crate::repo::store::{DonationStore, DonorStore};
use crate::service::ledger::Ledger;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Clone)]
pub struct DonationService {
    pub donations: Arc<dyn DonationStore>,
    pub donors: Arc<dyn DonorStore>,
    pub registry: GatewayRegistry,
    pub ledger: Ledger,
    pub settings: GatewaySettings,
}

impl DonationService {
    pub async fn process(
        &self,
        req: CreateDonationRequest,
    ) -> Result<CreateDonationResponse, DonationError> {
        validate_request(&req, &self.settings)?;

        let gateway = self
            .registry
            .resolve_available(&req.gateway)
            .ok_or_else(|| DonationError::GatewayUnavailable(req.gateway.clone()))?;

        // Contact details refresh on every validated request, resubmissions
        // included; aggregates are untouched here.
        self.donors
            .upsert_contact(&req.donor_email, &req.donor_name, req.donor_phone.as_deref())
            .await?;

        // The external donation id is the idempotency key: a resubmission of
        // a finished donation returns its recorded outcome, a resubmission of
        // a pending one re-dispatches and adopts the new provider reference.
        match self.donations.find(&req.donation_id).await? {
            Some(existing) if existing.status.is_terminal() => {
                return Ok(response_from_record(&existing));
            }
            Some(_) => {}
            None => {
                self.donations.insert_pending(&new_donation(&req)).await?;
            }
        }

        let charge = charge_request(&req);
        let outcome = match gateway.process_payment(&charge).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    donation_id = %req.donation_id,
                    gateway = %req.gateway,
                    error = %e,
                    "gateway dispatch failed"
                );
                ChargeOutcome::declined(
                    "the payment could not be processed, please try again",
                    serde_json::Value::Null,
                )
            }
        };

        if !outcome.approved {
            self.donations
                .fail_if_pending(&req.donation_id, &outcome.raw)
                .await?;
            return Ok(CreateDonationResponse {
                donation_id: req.donation_id,
                status: DonationStatus::Failed,
                transaction_id: None,
                redirect_url: None,
                client_secret: None,
                poll_handle: None,
                message: outcome.message,
            });
        }

        if outcome.status == ChargeStatus::Completed {
            let flipped = self
                .donations
                .complete_if_pending(&req.donation_id, outcome.transaction_id.as_deref(), &outcome.raw)
                .await?;
            if flipped {
                if let Some(record) = self.donations.find(&req.donation_id).await? {
                    if let Err(e) = self.ledger.on_completed(&record).await {
                        tracing::error!(
                            donation_id = %req.donation_id,
                            error = %e,
                            "ledger update failed; donation stays completed, reconcile manually"
                        );
                    }
                }
            }
            return Ok(CreateDonationResponse {
                donation_id: req.donation_id,
                status: DonationStatus::Completed,
                transaction_id: outcome.transaction_id,
                redirect_url: None,
                client_secret: None,
                poll_handle: None,
                message: outcome.message,
            });
        }

        self.donations
            .record_dispatch(
                &req.donation_id,
                outcome.transaction_id.as_deref(),
                outcome.poll_handle.as_deref(),
                &outcome.raw,
            )
            .await?;

        Ok(CreateDonationResponse {
            donation_id: req.donation_id,
            status: DonationStatus::Pending,
            transaction_id: outcome.transaction_id,
            redirect_url: outcome.redirect_url,
            client_secret: outcome.client_secret,
            poll_handle: outcome.poll_handle,
            message: outcome.message,
        })
    }
}

pub fn validate_request(
    req: &CreateDonationRequest,
    settings: &GatewaySettings,
) -> Result<(), DonationError> {
    if req.donation_id.trim().is_empty() {
        return Err(DonationError::Validation("donation_id is required".to_string()));
    }
    if req.amount <= Decimal::ZERO {
        return Err(DonationError::Validation("amount must be greater than zero".to_string()));
    }
    if req.amount < settings.min_amount || req.amount > settings.max_amount {
        return Err(DonationError::Validation(format!(
            "amount must be between {} and {}",
            settings.min_amount, settings.max_amount
        )));
    }
    if !settings.supports_currency(&req.currency) {
        return Err(DonationError::Validation(format!(
            "currency {} is not supported",
            req.currency
        )));
    }
    if !is_valid_email(&req.donor_email) {
        return Err(DonationError::Validation("donor email is invalid".to_string()));
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

fn new_donation(req: &CreateDonationRequest) -> NewDonation {
    NewDonation {
        donation_id: req.donation_id.clone(),
        campaign_id: req.campaign_id,
        form_id: req.form_id.clone(),
        donor_email: req.donor_email.clone(),
        donor_name: req.donor_name.clone(),
        amount: req.amount,
        currency: req.currency.to_ascii_uppercase(),
        gateway: req.gateway.clone(),
        is_recurring: req.is_recurring,
        recurring_interval: req.recurring_interval.map(|i| i.as_str().to_string()),
        anonymous: req.anonymous,
        donor_message: req.donor_message.clone(),
    }
}

fn charge_request(req: &CreateDonationRequest) -> ChargeRequest {
    ChargeRequest {
        donation_id: req.donation_id.clone(),
        amount: req.amount,
        currency: req.currency.to_ascii_uppercase(),
        donor_name: req.donor_name.clone(),
        donor_email: req.donor_email.clone(),
        donor_phone: req.donor_phone.clone(),
        is_recurring: req.is_recurring,
        recurring_interval: req.recurring_interval,
        bank_code: req.bank_code.clone(),
    }
}

fn response_from_record(record: &DonationRecord) -> CreateDonationResponse {
    CreateDonationResponse {
        donation_id: record.donation_id.clone(),
        status: record.status,
        transaction_id: record.gateway_transaction_id.clone(),
        redirect_url: None,
        client_secret: None,
        poll_handle: record.poll_handle.clone(),
        message: Some("donation already processed".to_string()),
    }
}
