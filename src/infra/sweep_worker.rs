//! Background loop that downgrades lapsed premium accounts.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::application::use_cases::sweep::SweepUseCases;

pub async fn run_sweep_loop(sweep_uc: Arc<SweepUseCases>, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs));

    info!("Expiry sweep worker started (every {}s)", interval_secs);

    loop {
        ticker.tick().await;
        match sweep_uc.run().await {
            Ok(report) if report.downgrades > 0 => {
                info!(
                    processed = report.processed,
                    downgrades = report.downgrades,
                    "Expiry sweep downgraded lapsed accounts"
                );
            }
            Ok(_) => {}
            // A failed pass is retried whole on the next tick.
            Err(e) => error!(error = %e, "Expiry sweep failed"),
        }
    }
}
