use dotenvy::dotenv;
use tracing::info;

use entitlement_api::infra::{app::create_app, setup::init_app_state, sweep_worker::run_sweep_loop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;
    let sweep_interval_secs = app_state.config.sweep_interval_secs;

    let app = create_app(app_state.clone());

    // Spawn the expiry sweep background task (after tracing is initialized)
    let sweep_use_cases = app_state.sweep_use_cases.clone();
    tokio::spawn(async move {
        run_sweep_loop(sweep_use_cases, sweep_interval_secs).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
