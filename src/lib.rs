pub mod config;
pub mod domain {
    pub mod donation;
    pub mod error;
    pub mod money;
}
pub mod gateways;
pub mod http {
    pub mod handlers {
        pub mod donations;
        pub mod gateways;
        pub mod webhooks;
    }
}
pub mod repo {
    pub mod campaigns_repo;
    pub mod donations_repo;
    pub mod donors_repo;
    pub mod memory;
    pub mod notification_repo;
    pub mod store;
}
pub mod service {
    pub mod donation_service;
    pub mod ledger;
    pub mod notification_dispatcher;
    pub mod reconciler;
}

#[derive(Clone)]
pub struct AppState {
    pub donation_service: service::donation_service::DonationService,
    pub reconciler: service::reconciler::Reconciler,
    pub registry: gateways::registry::GatewayRegistry,
}
