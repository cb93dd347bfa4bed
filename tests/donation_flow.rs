use axum::http::HeaderMap;
use donations_gateway::config::{
    BankSwitchSettings, CardSettings, GatewaySettings, MobileMoneySettings, WalletSettings,
};
use donations_gateway::domain::donation::{CreateDonationRequest, DonationStatus};
use donations_gateway::domain::error::DonationError;
use donations_gateway::gateways::mock::MockGateway;
use donations_gateway::gateways::registry::GatewayRegistry;
use donations_gateway::repo::campaigns_repo::CampaignTotals;
use donations_gateway::repo::memory::MemoryStore;
use donations_gateway::repo::store::{CampaignStore, DonationStore, DonorStore, NotificationStore};
use donations_gateway::service::donation_service::DonationService;
use donations_gateway::service::ledger::Ledger;
use donations_gateway::service::notification_dispatcher::NotificationDispatcher;
use donations_gateway::service::reconciler::Reconciler;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn synchronous_completion_applies_the_ledger_once() {
    let h = harness("ALWAYS_COMPLETE");
    let campaign_id = h.seed_campaign(dec!(100));
    let req = request("don_1", Some(campaign_id));

    let resp = h.service.process(req.clone()).await.unwrap();
    assert_eq!(resp.status, DonationStatus::Completed);

    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));
    assert_eq!(donor.donation_count, 1);
    let totals = h.campaigns.find_totals(campaign_id).await.unwrap().unwrap();
    assert_eq!(totals.raised_amount, dec!(25));
    assert_eq!(totals.donation_count, 1);

    // A resubmission of a finished donation returns the recorded outcome and
    // never re-applies aggregates.
    let resp = h.service.process(req).await.unwrap();
    assert_eq!(resp.status, DonationStatus::Completed);
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));
    assert_eq!(donor.donation_count, 1);
    let totals = h.campaigns.find_totals(campaign_id).await.unwrap().unwrap();
    assert_eq!(totals.raised_amount, dec!(25));
}

#[tokio::test]
async fn declined_dispatch_fails_without_touching_aggregates() {
    let h = harness("ALWAYS_DECLINE");
    let resp = h.service.process(request("don_2", None)).await.unwrap();
    assert_eq!(resp.status, DonationStatus::Failed);

    let record = h.donations.find("don_2").await.unwrap().unwrap();
    assert_eq!(record.status, DonationStatus::Failed);
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(0));
    assert_eq!(donor.donation_count, 0);
}

#[tokio::test]
async fn poll_paid_completes_and_applies_the_ledger_once() {
    let h = harness("POLL_PAID");
    let resp = h.service.process(request("don_3", None)).await.unwrap();
    assert_eq!(resp.status, DonationStatus::Pending);
    assert!(resp.poll_handle.is_some());

    let status = h.reconciler.check("don_3").await.unwrap();
    assert_eq!(status.status, DonationStatus::Completed);
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));

    // A second check finds the terminal row and does not touch the ledger.
    let status = h.reconciler.check("don_3").await.unwrap();
    assert_eq!(status.status, DonationStatus::Completed);
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));
    assert_eq!(donor.donation_count, 1);
}

#[tokio::test]
async fn redispatch_adopts_the_newly_issued_poll_handle() {
    let h = harness("");
    let first = h.service.process(request("don_4", None)).await.unwrap();
    let second = h.service.process(request("don_4", None)).await.unwrap();

    let first_handle = first.poll_handle.unwrap();
    let second_handle = second.poll_handle.unwrap();
    assert_ne!(first_handle, second_handle);

    // The stored handle follows the transaction the payer actually sees.
    let record = h.donations.find("don_4").await.unwrap().unwrap();
    assert_eq!(record.poll_handle.as_deref(), Some(second_handle.as_str()));
}

#[tokio::test]
async fn resubmission_refreshes_donor_contact() {
    let h = harness("");
    h.service.process(request("don_5", None)).await.unwrap();

    let mut updated = request("don_5", None);
    updated.donor_name = "A Donor Renamed".to_string();
    updated.donor_phone = Some("0771234567".to_string());
    h.service.process(updated).await.unwrap();

    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.name, "A Donor Renamed");
    assert_eq!(donor.phone.as_deref(), Some("0771234567"));
}

#[tokio::test]
async fn repeated_webhook_delivery_applies_the_ledger_once() {
    let h = harness("WEBHOOKS");
    h.service.process(request("don_6", None)).await.unwrap();

    let body = json!({"donation_id": "don_6", "status": "completed", "transaction_id": "txn_6"});
    let body = serde_json::to_vec(&body).unwrap();

    h.reconciler.process_webhook("mock", &body, &HeaderMap::new()).await.unwrap();
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));
    assert_eq!(donor.donation_count, 1);

    // Redelivery of the same terminal event is acknowledged and ignored.
    h.reconciler.process_webhook("mock", &body, &HeaderMap::new()).await.unwrap();
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));
    assert_eq!(donor.donation_count, 1);
}

#[tokio::test]
async fn conflicting_webhook_is_dropped_and_acknowledged() {
    let h = harness("WEBHOOKS");
    h.service.process(request("don_7", None)).await.unwrap();

    let completed = serde_json::to_vec(&json!({"donation_id": "don_7", "status": "completed"})).unwrap();
    h.reconciler.process_webhook("mock", &completed, &HeaderMap::new()).await.unwrap();

    let failed = serde_json::to_vec(&json!({"donation_id": "don_7", "status": "failed"})).unwrap();
    h.reconciler.process_webhook("mock", &failed, &HeaderMap::new()).await.unwrap();

    let record = h.donations.find("don_7").await.unwrap().unwrap();
    assert_eq!(record.status, DonationStatus::Completed);
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));
}

#[tokio::test]
async fn webhook_for_unknown_donation_is_not_found() {
    let h = harness("WEBHOOKS");
    let body = serde_json::to_vec(&json!({"donation_id": "ghost", "status": "completed"})).unwrap();
    let result = h.reconciler.process_webhook("mock", &body, &HeaderMap::new()).await;
    assert!(matches!(result, Err(DonationError::NotFound(_))));

    let result = h.reconciler.process_webhook("ghost-gateway", &body, &HeaderMap::new()).await;
    assert!(matches!(result, Err(DonationError::NotFound(_))));
}

#[tokio::test]
async fn confirmation_wait_settles_or_reports_pending() {
    let h = harness("POLL_PAID");
    h.service.process(request("don_8", None)).await.unwrap();
    let resp = h
        .reconciler
        .poll_until_terminal("don_8", Duration::ZERO, 5)
        .await
        .unwrap();
    assert_eq!(resp.status, DonationStatus::Completed);

    let h = harness("");
    h.service.process(request("don_9", None)).await.unwrap();
    let resp = h
        .reconciler
        .poll_until_terminal("don_9", Duration::ZERO, 3)
        .await
        .unwrap();
    assert_eq!(resp.status, DonationStatus::Pending);
    assert_eq!(resp.message, "payment still pending, check back later");
}

#[tokio::test]
async fn recompute_repairs_drifted_aggregates() {
    let h = harness("ALWAYS_COMPLETE");
    let campaign_id = h.seed_campaign(dec!(1000));
    h.service.process(request("don_10", Some(campaign_id))).await.unwrap();

    h.donors
        .set_aggregates("donor@example.org", dec!(999), 9, None, None)
        .await
        .unwrap();
    h.ledger.recompute_donor("donor@example.org").await.unwrap();
    let donor = h.donors.find("donor@example.org").await.unwrap().unwrap();
    assert_eq!(donor.total_donated, dec!(25));
    assert_eq!(donor.donation_count, 1);
    assert!(donor.first_donation_at.is_some());

    h.campaigns.set_aggregates(campaign_id, dec!(0), 0).await.unwrap();
    h.ledger.recompute_campaign(campaign_id).await.unwrap();
    let totals = h.campaigns.find_totals(campaign_id).await.unwrap().unwrap();
    assert_eq!(totals.raised_amount, dec!(25));
    assert_eq!(totals.donation_count, 1);
}

struct Harness {
    store: Arc<MemoryStore>,
    donations: Arc<dyn DonationStore>,
    donors: Arc<dyn DonorStore>,
    campaigns: Arc<dyn CampaignStore>,
    ledger: Ledger,
    service: DonationService,
    reconciler: Reconciler,
}

impl Harness {
    fn seed_campaign(&self, goal: rust_decimal::Decimal) -> Uuid {
        let campaign_id = Uuid::new_v4();
        self.store.seed_campaign(CampaignTotals {
            campaign_id,
            title: "Test Campaign".to_string(),
            goal_amount: goal,
            raised_amount: dec!(0),
            donation_count: 0,
        });
        campaign_id
    }
}

fn harness(behavior: &str) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let donations: Arc<dyn DonationStore> = store.clone();
    let donors: Arc<dyn DonorStore> = store.clone();
    let campaigns: Arc<dyn CampaignStore> = store.clone();
    let subscriptions: Arc<dyn NotificationStore> = store.clone();

    let mut registry = GatewayRegistry::new(vec!["mock".to_string()]);
    registry.register(Arc::new(MockGateway {
        gateway_id: "mock".to_string(),
        available: true,
        behavior: behavior.to_string(),
        ..Default::default()
    }));

    let notifications = NotificationDispatcher {
        subscriptions,
        client: reqwest::Client::new(),
    };
    let ledger = Ledger {
        donations: donations.clone(),
        donors: donors.clone(),
        campaigns: campaigns.clone(),
        notifications,
    };
    let service = DonationService {
        donations: donations.clone(),
        donors: donors.clone(),
        registry: registry.clone(),
        ledger: ledger.clone(),
        settings: settings(),
    };
    let reconciler = Reconciler {
        donations: donations.clone(),
        registry,
        ledger: ledger.clone(),
    };

    Harness {
        store,
        donations,
        donors,
        campaigns,
        ledger,
        service,
        reconciler,
    }
}

fn request(donation_id: &str, campaign_id: Option<Uuid>) -> CreateDonationRequest {
    CreateDonationRequest {
        donation_id: donation_id.to_string(),
        amount: dec!(25),
        currency: "USD".to_string(),
        gateway: "mock".to_string(),
        campaign_id,
        form_id: None,
        donor_name: "A Donor".to_string(),
        donor_email: "donor@example.org".to_string(),
        donor_phone: None,
        donor_message: None,
        is_recurring: false,
        recurring_interval: None,
        anonymous: false,
        bank_code: None,
    }
}

fn settings() -> GatewaySettings {
    GatewaySettings {
        enabled_gateways: vec!["mock".to_string()],
        test_mode: true,
        min_amount: dec!(1),
        max_amount: dec!(100000),
        currencies: vec!["USD".to_string(), "ZWL".to_string()],
        card: CardSettings {
            enabled: false,
            base_url: String::new(),
            publishable_key: String::new(),
            secret_key: String::new(),
            webhook_secret: String::new(),
            webhook_tolerance_secs: 300,
            timeout_secs: 5,
        },
        wallet: WalletSettings {
            enabled: false,
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            webhook_secret: String::new(),
            return_url: String::new(),
            cancel_url: String::new(),
            timeout_secs: 5,
        },
        mobile: MobileMoneySettings {
            enabled: false,
            base_url: String::new(),
            integration_id: String::new(),
            integration_key: String::new(),
            return_url: String::new(),
            result_url: String::new(),
            timeout_secs: 5,
        },
        bank: BankSwitchSettings {
            enabled: false,
            base_url: String::new(),
            merchant_id: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            return_url: String::new(),
            timeout_secs: 5,
        },
    }
}
