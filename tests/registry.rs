use donations_gateway::gateways::mock::MockGateway;
use donations_gateway::gateways::registry::GatewayRegistry;
use std::sync::Arc;

#[test]
fn available_follows_the_enabled_list_order() {
    let mut registry = GatewayRegistry::new(vec![
        "wallet".to_string(),
        "card".to_string(),
    ]);
    registry.register(mock("card", true));
    registry.register(mock("wallet", true));

    let ids: Vec<String> = registry.available().iter().map(|g| g.id().to_string()).collect();
    assert_eq!(ids, vec!["wallet", "card"]);
}

#[test]
fn unconfigured_adapter_is_not_offered() {
    let mut registry = GatewayRegistry::new(vec!["card".to_string(), "wallet".to_string()]);
    registry.register(mock("card", true));
    registry.register(mock("wallet", false));

    let ids: Vec<String> = registry.available().iter().map(|g| g.id().to_string()).collect();
    assert_eq!(ids, vec!["card"]);
}

#[test]
fn disabled_adapter_is_not_offered_even_when_configured() {
    let mut registry = GatewayRegistry::new(vec!["card".to_string()]);
    registry.register(mock("card", true));
    registry.register(mock("wallet", true));

    let ids: Vec<String> = registry.available().iter().map(|g| g.id().to_string()).collect();
    assert_eq!(ids, vec!["card"]);
}

#[test]
fn resolve_finds_registered_adapters_regardless_of_enablement() {
    let mut registry = GatewayRegistry::new(vec!["card".to_string()]);
    registry.register(mock("wallet", true));

    assert!(registry.resolve("wallet").is_some());
    assert!(registry.resolve("missing").is_none());
}

#[test]
fn resolve_available_enforces_both_gates() {
    let mut registry = GatewayRegistry::new(vec!["card".to_string()]);
    registry.register(mock("card", false));
    registry.register(mock("wallet", true));

    // Enabled but unconfigured.
    assert!(registry.resolve_available("card").is_none());
    // Configured but not enabled.
    assert!(registry.resolve_available("wallet").is_none());

    let mut registry = GatewayRegistry::new(vec!["card".to_string()]);
    registry.register(mock("card", true));
    assert!(registry.resolve_available("card").is_some());
}

fn mock(id: &str, available: bool) -> Arc<MockGateway> {
    Arc::new(MockGateway {
        gateway_id: id.to_string(),
        available,
        ..Default::default()
    })
}
