//! Port for the card-payment gateway's verification API.

use async_trait::async_trait;

use crate::application::app_error::AppResult;

/// Result of asking the gateway whether a payment reference really succeeded.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Success {
        amount_minor: Option<i64>,
        currency: Option<String>,
        raw_status: String,
    },
    Failed {
        raw_status: String,
    },
}

#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    /// Verifies a transaction reference with the gateway. Transport failures
    /// surface as errors; a declined/unknown payment is a `Failed` outcome.
    async fn verify(&self, reference: &str) -> AppResult<VerifyOutcome>;
}
