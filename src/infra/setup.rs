use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::use_cases::{
        reconcile::{ReconcileUseCases, ReconciliationRepo},
        sweep::{EntitlementSweepRepo, SweepUseCases},
    },
    infra::{
        billing_client::HttpBillingService, config::AppConfig, db::init_db,
        gateway_client::HttpPaymentGateway,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));

    let reconcile_repo = postgres_arc.clone() as Arc<dyn ReconciliationRepo>;
    let sweep_repo = postgres_arc as Arc<dyn EntitlementSweepRepo>;

    let payment_gateway = Arc::new(HttpPaymentGateway::new(
        config.gateway_base_url.clone(),
        config.gateway_api_key.clone(),
        config.verify_timeout_secs,
    ));
    let billing_service = Arc::new(HttpBillingService::new(
        config.billing_base_url.clone(),
        config.billing_api_key.clone(),
        config.verify_timeout_secs,
    ));

    let reconcile_use_cases = ReconcileUseCases::new(reconcile_repo);
    let sweep_use_cases = SweepUseCases::new(sweep_repo, config.sweep_page_size);

    Ok(AppState {
        config: Arc::new(config),
        reconcile_use_cases: Arc::new(reconcile_use_cases),
        sweep_use_cases: Arc::new(sweep_use_cases),
        payment_gateway,
        billing_service,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "entitlement_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
