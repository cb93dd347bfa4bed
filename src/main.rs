use axum::routing::{get, post};
use axum::Router;
use donations_gateway::config::AppConfig;
use donations_gateway::gateways::registry::GatewayRegistry;
use donations_gateway::repo::campaigns_repo::CampaignsRepo;
use donations_gateway::repo::donations_repo::DonationsRepo;
use donations_gateway::repo::donors_repo::DonorsRepo;
use donations_gateway::repo::notification_repo::NotificationRepo;
use donations_gateway::repo::store::{CampaignStore, DonationStore, DonorStore, NotificationStore};
use donations_gateway::service::donation_service::DonationService;
use donations_gateway::service::ledger::Ledger;
use donations_gateway::service::notification_dispatcher::NotificationDispatcher;
use donations_gateway::service::reconciler::Reconciler;
use donations_gateway::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let donations: Arc<dyn DonationStore> = Arc::new(DonationsRepo { pool: pool.clone() });
    let donors: Arc<dyn DonorStore> = Arc::new(DonorsRepo { pool: pool.clone() });
    let campaigns: Arc<dyn CampaignStore> = Arc::new(CampaignsRepo { pool: pool.clone() });
    let subscriptions: Arc<dyn NotificationStore> = Arc::new(NotificationRepo { pool: pool.clone() });

    let client = reqwest::Client::new();
    let registry = GatewayRegistry::build(&cfg.settings, client.clone());

    let notifications = NotificationDispatcher {
        subscriptions,
        client: client.clone(),
    };
    let ledger = Ledger {
        donations: donations.clone(),
        donors: donors.clone(),
        campaigns,
        notifications,
    };

    let donation_service = DonationService {
        donations: donations.clone(),
        donors,
        registry: registry.clone(),
        ledger: ledger.clone(),
        settings: cfg.settings.clone(),
    };
    let reconciler = Reconciler {
        donations,
        registry: registry.clone(),
        ledger,
    };

    let state = AppState {
        donation_service,
        reconciler,
        registry,
    };

    let app = Router::new()
        .route("/health", get(donations_gateway::http::handlers::donations::health))
        .route("/donations", post(donations_gateway::http::handlers::donations::create_donation))
        .route(
            "/donations/:donation_id/status",
            get(donations_gateway::http::handlers::donations::get_status),
        )
        .route(
            "/donations/:donation_id/confirmation",
            get(donations_gateway::http::handlers::donations::await_confirmation),
        )
        .route("/gateways", get(donations_gateway::http::handlers::gateways::list_gateways))
        .route(
            "/webhooks/:gateway_id",
            post(donations_gateway::http::handlers::webhooks::receive_webhook),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
