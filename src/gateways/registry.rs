use crate::config::GatewaySettings;
use crate::gateways::bank_switch::BankSwitchGateway;
use crate::gateways::card::CardGateway;
use crate::gateways::mobile_money::MobileMoneyGateway;
use crate::gateways::redirect_wallet::RedirectWalletGateway;
use crate::gateways::DonationGateway;
use std::sync::Arc;

/// Holds every instantiated adapter. The enabled list controls which subset
/// is offered to payers and the order they appear in; new adapters are added
/// with `register` without touching the existing ones.
#[derive(Clone)]
pub struct GatewayRegistry {
    gateways: Vec<Arc<dyn DonationGateway>>,
    enabled: Vec<String>,
}

impl GatewayRegistry {
    pub fn new(enabled: Vec<String>) -> Self {
        Self {
            gateways: Vec::new(),
            enabled,
        }
    }

    pub fn build(settings: &GatewaySettings, client: reqwest::Client) -> Self {
        let mut registry = Self::new(settings.enabled_gateways.clone());
        registry.register(Arc::new(CardGateway::new(settings.card.clone(), client.clone())));
        registry.register(Arc::new(RedirectWalletGateway::new(
            settings.wallet.clone(),
            client.clone(),
        )));
        registry.register(Arc::new(MobileMoneyGateway::new(
            settings.mobile.clone(),
            client.clone(),
        )));
        registry.register(Arc::new(BankSwitchGateway::new(settings.bank.clone(), client)));
        registry
    }

    pub fn register(&mut self, gateway: Arc<dyn DonationGateway>) {
        self.gateways.push(gateway);
    }

    /// Enabled and correctly configured adapters, in the order of the
    /// configured enabled list.
    pub fn available(&self) -> Vec<Arc<dyn DonationGateway>> {
        self.enabled
            .iter()
            .filter_map(|id| self.resolve(id))
            .filter(|g| g.is_available())
            .collect()
    }

    pub fn resolve(&self, id: &str) -> Option<Arc<dyn DonationGateway>> {
        self.gateways.iter().find(|g| g.id() == id).cloned()
    }

    /// Resolves an adapter only if it is enabled and has its credentials;
    /// used when dispatching an actual payment.
    pub fn resolve_available(&self, id: &str) -> Option<Arc<dyn DonationGateway>> {
        if !self.enabled.iter().any(|e| e == id) {
            return None;
        }
        self.resolve(id).filter(|g| g.is_available())
    }
}
