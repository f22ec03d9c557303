//! Port for the app-store billing service's server-to-server API.

use async_trait::async_trait;

use crate::application::app_error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
    Active,
    GracePeriod,
    Canceled,
    Expired,
}

/// Provider-reported subscription state for a purchase token.
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    pub phase: SubscriptionPhase,
    /// Authoritative expiry in epoch milliseconds, when reported.
    pub expires_at_ms: Option<i64>,
    /// Provider-assigned order identifier for the current period.
    pub order_id: Option<String>,
}

#[async_trait]
pub trait BillingServicePort: Send + Sync {
    async fn get_subscription(
        &self,
        package_name: &str,
        product_id: &str,
        purchase_token: &str,
    ) -> AppResult<SubscriptionInfo>;

    /// Tells the billing service the purchase was processed. Best-effort: the
    /// caller logs failures and never rolls back on them.
    async fn acknowledge(
        &self,
        package_name: &str,
        product_id: &str,
        purchase_token: &str,
    ) -> AppResult<()>;
}
