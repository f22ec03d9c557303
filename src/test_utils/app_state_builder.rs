//! Builder for an `AppState` wired to in-memory mocks, for HTTP-level tests.

use std::sync::Arc;

use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::ports::{billing_service::BillingServicePort, payment_gateway::PaymentGatewayPort},
    application::use_cases::{reconcile::ReconcileUseCases, sweep::SweepUseCases},
    infra::config::AppConfig,
    test_utils::{
        InMemoryStore, TEST_WEBHOOK_SECRET,
        client_mocks::{MockBillingService, MockPaymentGateway},
    },
};

pub const TEST_OPERATOR_TOKEN: &str = "op_test_token";

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: String::new(),
        cors_origin: "http://localhost:3000".parse().unwrap(),
        gateway_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        gateway_api_key: SecretString::new("sk_test".into()),
        gateway_base_url: "http://gateway.invalid/".parse().unwrap(),
        billing_base_url: "http://billing.invalid/".parse().unwrap(),
        billing_api_key: SecretString::new("bk_test".into()),
        operator_token: SecretString::new(TEST_OPERATOR_TOKEN.into()),
        verify_timeout_secs: 1,
        sweep_interval_secs: 3600,
        sweep_page_size: 300,
    }
}

pub struct TestAppStateBuilder {
    payment_gateway: Arc<dyn PaymentGatewayPort>,
    billing_service: Arc<dyn BillingServicePort>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            payment_gateway: Arc::new(MockPaymentGateway::succeeding(5000, "USD")),
            billing_service: Arc::new(MockBillingService::default()),
        }
    }

    pub fn with_payment_gateway(mut self, gateway: MockPaymentGateway) -> Self {
        self.payment_gateway = Arc::new(gateway);
        self
    }

    pub fn with_billing_service(mut self, billing: MockBillingService) -> Self {
        self.billing_service = Arc::new(billing);
        self
    }

    /// Builds the state and hands back the store so tests can seed and
    /// inspect it directly.
    pub fn build_with_store(self) -> (AppState, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let config = test_config();

        let reconcile_use_cases = ReconcileUseCases::new(store.clone());
        let sweep_use_cases = SweepUseCases::new(store.clone(), config.sweep_page_size);

        let state = AppState {
            config: Arc::new(config),
            reconcile_use_cases: Arc::new(reconcile_use_cases),
            sweep_use_cases: Arc::new(sweep_use_cases),
            payment_gateway: self.payment_gateway,
            billing_service: self.billing_service,
        };

        (state, store)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
