//! HTTP client for the app-store billing service's server-to-server API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::billing_service::{
    BillingServicePort, SubscriptionInfo, SubscriptionPhase,
};

const CONNECT_TIMEOUT_SECS: u64 = 5;

pub struct HttpBillingService {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpBillingService {
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

    fn subscription_url(&self, package_name: &str, product_id: &str, token: &str) -> AppResult<Url> {
        self.base_url
            .join(&format!(
                "purchases/subscriptions/{package_name}/{product_id}/tokens/{token}"
            ))
            .map_err(|e| AppError::Internal(format!("Invalid billing URL: {e}")))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionResponse {
    state: String,
    expires_at_ms: Option<i64>,
    order_id: Option<String>,
}

fn parse_phase(state: &str) -> AppResult<SubscriptionPhase> {
    match state {
        "active" => Ok(SubscriptionPhase::Active),
        "grace_period" => Ok(SubscriptionPhase::GracePeriod),
        "canceled" => Ok(SubscriptionPhase::Canceled),
        "expired" => Ok(SubscriptionPhase::Expired),
        other => Err(AppError::Upstream(format!(
            "Billing service reported unknown subscription state '{other}'"
        ))),
    }
}

#[async_trait]
impl BillingServicePort for HttpBillingService {
    async fn get_subscription(
        &self,
        package_name: &str,
        product_id: &str,
        purchase_token: &str,
    ) -> AppResult<SubscriptionInfo> {
        let url = self.subscription_url(package_name, product_id, purchase_token)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Subscription lookup failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Subscription lookup returned {}",
                response.status()
            )));
        }

        let body: SubscriptionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Subscription response unreadable: {e}")))?;

        Ok(SubscriptionInfo {
            phase: parse_phase(&body.state)?,
            expires_at_ms: body.expires_at_ms,
            order_id: body.order_id,
        })
    }

    async fn acknowledge(
        &self,
        package_name: &str,
        product_id: &str,
        purchase_token: &str,
    ) -> AppResult<()> {
        let mut url = self.subscription_url(package_name, product_id, purchase_token)?;
        url.set_path(&format!("{}:acknowledge", url.path()));

        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Acknowledge request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Acknowledge returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
