//! Mock clients for the payment gateway and billing service.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        billing_service::{BillingServicePort, SubscriptionInfo, SubscriptionPhase},
        payment_gateway::{PaymentGatewayPort, VerifyOutcome},
    },
};

pub struct MockPaymentGateway {
    outcome: VerifyOutcome,
}

impl MockPaymentGateway {
    pub fn succeeding(amount_minor: i64, currency: &str) -> Self {
        Self {
            outcome: VerifyOutcome::Success {
                amount_minor: Some(amount_minor),
                currency: Some(currency.to_string()),
                raw_status: "success".to_string(),
            },
        }
    }

    pub fn failing(raw_status: &str) -> Self {
        Self {
            outcome: VerifyOutcome::Failed {
                raw_status: raw_status.to_string(),
            },
        }
    }
}

#[async_trait]
impl PaymentGatewayPort for MockPaymentGateway {
    async fn verify(&self, _reference: &str) -> AppResult<VerifyOutcome> {
        Ok(self.outcome.clone())
    }
}

pub struct MockBillingService {
    subscription: Option<SubscriptionInfo>,
    /// Purchase tokens acknowledged so far.
    acknowledged: Arc<Mutex<Vec<String>>>,
}

impl MockBillingService {
    pub fn with_subscription(subscription: SubscriptionInfo) -> Self {
        Self {
            subscription: Some(subscription),
            acknowledged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            subscription: None,
            acknowledged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn acknowledged_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.acknowledged.clone()
    }
}

impl Default for MockBillingService {
    fn default() -> Self {
        Self::with_subscription(SubscriptionInfo {
            phase: SubscriptionPhase::Active,
            expires_at_ms: None,
            order_id: Some("order-default".to_string()),
        })
    }
}

#[async_trait]
impl BillingServicePort for MockBillingService {
    async fn get_subscription(
        &self,
        _package_name: &str,
        _product_id: &str,
        _purchase_token: &str,
    ) -> AppResult<SubscriptionInfo> {
        self.subscription
            .clone()
            .ok_or_else(|| AppError::Upstream("Billing service unavailable".to_string()))
    }

    async fn acknowledge(
        &self,
        _package_name: &str,
        _product_id: &str,
        purchase_token: &str,
    ) -> AppResult<()> {
        self.acknowledged
            .lock()
            .unwrap()
            .push(purchase_token.to_string());
        Ok(())
    }
}
