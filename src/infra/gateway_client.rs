//! HTTP client for the card gateway's transaction-verify API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::payment_gateway::{PaymentGatewayPort, VerifyOutcome};

const CONNECT_TIMEOUT_SECS: u64 = 5;

pub struct HttpPaymentGateway {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpPaymentGateway {
    pub fn new(base_url: Url, api_key: SecretString, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct VerifyResponse {
    status: bool,
    data: VerifyData,
}

#[derive(Deserialize)]
struct VerifyData {
    status: String,
    amount: Option<i64>,
    currency: Option<String>,
}

#[async_trait]
impl PaymentGatewayPort for HttpPaymentGateway {
    async fn verify(&self, reference: &str) -> AppResult<VerifyOutcome> {
        let url = self
            .base_url
            .join(&format!("transaction/verify/{reference}"))
            .map_err(|e| AppError::Internal(format!("Invalid gateway URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Gateway verify request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Gateway verify returned {}",
                response.status()
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Gateway verify response unreadable: {e}")))?;

        let verified = body.status && body.data.status == "success";
        if verified {
            Ok(VerifyOutcome::Success {
                amount_minor: body.data.amount,
                currency: body.data.currency,
                raw_status: body.data.status,
            })
        } else {
            Ok(VerifyOutcome::Failed {
                raw_status: body.data.status,
            })
        }
    }
}
