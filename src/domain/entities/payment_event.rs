use serde::{Deserialize, Serialize};

/// External source a payment signal arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Gateway,
    BillingService,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gateway => "gateway",
            Provider::BillingService => "billing_service",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gateway" => Some(Provider::Gateway),
            "billing_service" => Some(Provider::BillingService),
            _ => None,
        }
    }
}

/// Canonical form of a payment/subscription signal, built per request by the
/// normalizer. `reference` is non-empty for any event that may mutate state;
/// payloads without one are dropped before an event is ever constructed.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub provider: Provider,
    pub event_type: String,
    pub reference: String,
    /// Unset until the identity resolver has run.
    pub account_id: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub requested_extension_days: Option<i64>,
    pub contact_email: Option<String>,
    /// Authoritative expiry reported by the provider, if the source carries one
    /// (subscription verifications do; card charges do not).
    pub provider_expires_at: Option<i64>,
    pub raw_status: Option<String>,
}

impl PaymentEvent {
    pub fn new(provider: Provider, event_type: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            provider,
            event_type: event_type.into(),
            reference: reference.into(),
            account_id: None,
            amount_minor: None,
            currency: None,
            requested_extension_days: None,
            contact_email: None,
            provider_expires_at: None,
            raw_status: None,
        }
    }
}
