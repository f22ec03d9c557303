use std::sync::Arc;

use crate::{
    application::ports::{billing_service::BillingServicePort, payment_gateway::PaymentGatewayPort},
    application::use_cases::{reconcile::ReconcileUseCases, sweep::SweepUseCases},
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub reconcile_use_cases: Arc<ReconcileUseCases>,
    pub sweep_use_cases: Arc<SweepUseCases>,
    pub payment_gateway: Arc<dyn PaymentGatewayPort>,
    pub billing_service: Arc<dyn BillingServicePort>,
}
