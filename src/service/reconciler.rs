use crate::domain::donation::{decide_transition, DonationStatus, StatusResponse, TransitionDecision};
use crate::domain::error::DonationError;
use crate::gateways::registry::GatewayRegistry;
use crate::repo::donations_repo::DonationRecord;
use crate::repo::store::DonationStore;
use crate::service::ledger::Ledger;
use axum::http::HeaderMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Drives asynchronous confirmation. The poll path and the webhook path both
/// converge on `apply_terminal_status`, which owns the sticky-terminal rule
/// and the exactly-once ledger gate.
#[derive(Clone)]
pub struct Reconciler {
    pub donations: Arc<dyn DonationStore>,
    pub registry: GatewayRegistry,
    pub ledger: Ledger,
}

impl Reconciler {
    /// Single status check: asks the gateway about the stored poll handle and
    /// applies the mapped outcome if it is terminal.
    pub async fn check(&self, donation_id: &str) -> Result<StatusResponse, DonationError> {
        let donation = self
            .donations
            .find(donation_id)
            .await?
            .ok_or_else(|| DonationError::NotFound(format!("unknown donation {donation_id}")))?;

        if donation.status.is_terminal() {
            return Ok(status_response(&donation, donation.status));
        }

        let Some(poll_handle) = donation.poll_handle.clone() else {
            return Ok(pending_response(&donation, "awaiting gateway confirmation"));
        };
        let Some(gateway) = self.registry.resolve(&donation.gateway) else {
            return Err(DonationError::GatewayUnavailable(donation.gateway.clone()));
        };

        let poll = match gateway.check_status(&poll_handle).await {
            Ok(poll) => poll,
            Err(e) => {
                tracing::warn!(
                    donation_id = %donation.donation_id,
                    gateway = %donation.gateway,
                    error = %e,
                    "status poll failed"
                );
                return Ok(pending_response(&donation, "provider unreachable, try again shortly"));
            }
        };

        if !poll.status.is_terminal() {
            return Ok(pending_response(&donation, "payment not yet confirmed"));
        }

        let status = self
            .apply_terminal_status(&donation, poll.status, poll.transaction_id.as_deref(), &poll.raw)
            .await?;
        Ok(status_response(&donation, status))
    }

    /// Bounded polling loop for push-prompt gateways: re-checks at a fixed
    /// interval until terminal or the attempt ceiling, then reports pending
    /// rather than blocking indefinitely.
    pub async fn poll_until_terminal(
        &self,
        donation_id: &str,
        interval: Duration,
        max_attempts: u32,
    ) -> Result<StatusResponse, DonationError> {
        match bounded_poll(interval, max_attempts, || self.check(donation_id)).await? {
            Some(resp) => Ok(resp),
            None => Ok(StatusResponse {
                donation_id: donation_id.to_string(),
                status: DonationStatus::Pending,
                message: "payment still pending, check back later".to_string(),
            }),
        }
    }

    pub async fn process_webhook(
        &self,
        gateway_id: &str,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<(), DonationError> {
        let gateway = self
            .registry
            .resolve(gateway_id)
            .ok_or_else(|| DonationError::NotFound(format!("unknown gateway {gateway_id}")))?;

        let event = gateway.verify_webhook(body, headers)?;
        if !event.status.is_terminal() {
            tracing::debug!(gateway = %gateway_id, donation_id = %event.donation_id, "ignoring non-terminal webhook event");
            return Ok(());
        }

        let donation = self
            .donations
            .find(&event.donation_id)
            .await?
            .ok_or_else(|| DonationError::NotFound(format!("unknown donation {}", event.donation_id)))?;

        match self
            .apply_terminal_status(&donation, event.status, event.transaction_id.as_deref(), &event.raw)
            .await
        {
            Ok(_) => Ok(()),
            // The payment already settled the other way; acknowledge so the
            // provider stops redelivering, never overwrite.
            Err(DonationError::ReconciliationConflict(msg)) => {
                tracing::warn!(gateway = %gateway_id, donation_id = %donation.donation_id, %msg, "dropping conflicting webhook");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_terminal_status(
        &self,
        donation: &DonationRecord,
        incoming: DonationStatus,
        transaction_id: Option<&str>,
        raw: &serde_json::Value,
    ) -> Result<DonationStatus, DonationError> {
        match decide_transition(donation.status, incoming) {
            TransitionDecision::AlreadyApplied => Ok(donation.status),
            TransitionDecision::Conflict => Err(DonationError::ReconciliationConflict(format!(
                "donation {} is {} and cannot become {}",
                donation.donation_id,
                donation.status.as_str(),
                incoming.as_str()
            ))),
            TransitionDecision::Apply => match incoming {
                DonationStatus::Completed => {
                    let flipped = self
                        .donations
                        .complete_if_pending(&donation.donation_id, transaction_id, raw)
                        .await?;
                    if flipped {
                        if let Some(record) = self.donations.find(&donation.donation_id).await? {
                            if let Err(e) = self.ledger.on_completed(&record).await {
                                tracing::error!(
                                    donation_id = %donation.donation_id,
                                    error = %e,
                                    "ledger update failed; donation stays completed, reconcile manually"
                                );
                            }
                        }
                        Ok(DonationStatus::Completed)
                    } else {
                        // Lost the race to another writer; report what stuck.
                        self.reload_status(&donation.donation_id).await
                    }
                }
                DonationStatus::Failed => {
                    let flipped = self
                        .donations
                        .fail_if_pending(&donation.donation_id, raw)
                        .await?;
                    if flipped {
                        Ok(DonationStatus::Failed)
                    } else {
                        self.reload_status(&donation.donation_id).await
                    }
                }
                DonationStatus::Pending => Ok(donation.status),
            },
        }
    }

    async fn reload_status(&self, donation_id: &str) -> Result<DonationStatus, DonationError> {
        let record = self
            .donations
            .find(donation_id)
            .await?
            .ok_or_else(|| DonationError::NotFound(format!("unknown donation {donation_id}")))?;
        Ok(record.status)
    }
}

/// Runs `check` up to `max_attempts` times with a fixed interval, returning
/// the first terminal response or None when the ceiling is hit.
pub async fn bounded_poll<F, Fut>(
    interval: Duration,
    max_attempts: u32,
    mut check: F,
) -> Result<Option<StatusResponse>, DonationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StatusResponse, DonationError>>,
{
    for attempt in 0..max_attempts {
        let resp = check().await?;
        if resp.status.is_terminal() {
            return Ok(Some(resp));
        }
        if attempt + 1 < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Ok(None)
}

fn status_response(donation: &DonationRecord, status: DonationStatus) -> StatusResponse {
    let message = match status {
        DonationStatus::Completed => "donation completed, thank you".to_string(),
        DonationStatus::Failed => "payment failed".to_string(),
        DonationStatus::Pending => "payment pending".to_string(),
    };
    StatusResponse {
        donation_id: donation.donation_id.clone(),
        status,
        message,
    }
}

fn pending_response(donation: &DonationRecord, message: &str) -> StatusResponse {
    StatusResponse {
        donation_id: donation.donation_id.clone(),
        status: DonationStatus::Pending,
        message: message.to_string(),
    }
}
