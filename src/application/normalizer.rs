//! Turns raw provider payloads into canonical [`PaymentEvent`]s.

use serde_json::Value;

use crate::application::ports::billing_service::{SubscriptionInfo, SubscriptionPhase};
use crate::domain::entities::payment_event::{PaymentEvent, Provider};

/// Applied when an event carries no usable extension hint.
pub const DEFAULT_EXTENSION_DAYS: i64 = 30;

/// Gateway event types with success semantics. Everything else is recorded as
/// ignored (when a reference exists) and processing stops.
const GATEWAY_SUCCESS_EVENTS: &[&str] = &["charge.success", "invoice.paid", "subscription.activate"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A would-be success event without any extractable reference. This is an
    /// unrecoverable classification failure, never retried.
    MissingReference,
    /// Nothing to record: neither success semantics nor a reference.
    Unclassifiable,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingReference => "missing-reference",
            DropReason::Unclassifiable => "unclassifiable",
        }
    }
}

/// Classification result for one raw payload.
#[derive(Debug, Clone)]
pub enum Normalized {
    /// The event should flow into the reconciliation transaction.
    Success(PaymentEvent),
    /// Known-but-irrelevant event type; recorded minimally in the ledger.
    Ignored(PaymentEvent),
    /// Nothing is written; the payload is logged and acknowledged.
    Drop(DropReason),
}

/// Canonicalizes a signature-verified gateway webhook payload.
pub fn normalize_gateway(payload: &Value) -> Normalized {
    let event_type = payload["event"].as_str().unwrap_or("").to_string();
    let data = &payload["data"];

    let reference = extract_reference(data);
    let is_success = GATEWAY_SUCCESS_EVENTS.contains(&event_type.as_str());

    let Some(reference) = reference else {
        return if is_success {
            Normalized::Drop(DropReason::MissingReference)
        } else {
            Normalized::Drop(DropReason::Unclassifiable)
        };
    };

    let mut event = PaymentEvent::new(Provider::Gateway, event_type, reference);
    event.amount_minor = data["amount"].as_i64();
    event.currency = data["currency"].as_str().map(str::to_string);
    event.raw_status = data["status"].as_str().map(str::to_string);
    event.contact_email = data["customer"]["email"].as_str().map(str::to_string);
    event.account_id = data["metadata"]["account_id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    event.requested_extension_days = Some(extension_days_from(
        as_day_count(&data["metadata"]["days"]),
        as_day_count(&data["metadata"]["months"]),
    ));

    if is_success {
        Normalized::Success(event)
    } else {
        Normalized::Ignored(event)
    }
}

/// Canonicalizes a billing-service subscription lookup for an account. The
/// provider's state vocabulary maps {active, grace-period} to success and
/// {canceled, expired} to an ignorable event.
pub fn normalize_subscription(
    account_id: &str,
    purchase_token: &str,
    info: &SubscriptionInfo,
) -> Normalized {
    // Order id is the provider-assigned transaction reference; the purchase
    // token is the stable fallback identifier.
    let reference = info
        .order_id
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| purchase_token.to_string());

    if reference.is_empty() {
        return Normalized::Drop(DropReason::MissingReference);
    }

    let event_type = match info.phase {
        SubscriptionPhase::Active => "subscription.active",
        SubscriptionPhase::GracePeriod => "subscription.grace",
        SubscriptionPhase::Canceled => "subscription.canceled",
        SubscriptionPhase::Expired => "subscription.expired",
    };

    let mut event = PaymentEvent::new(Provider::BillingService, event_type, reference);
    event.account_id = Some(account_id.to_string());
    event.provider_expires_at = info.expires_at_ms;
    event.raw_status = Some(event_type.to_string());
    event.requested_extension_days = Some(DEFAULT_EXTENSION_DAYS);

    match info.phase {
        SubscriptionPhase::Active | SubscriptionPhase::GracePeriod => Normalized::Success(event),
        SubscriptionPhase::Canceled | SubscriptionPhase::Expired => Normalized::Ignored(event),
    }
}

/// Fixed reference precedence: explicit transaction reference, then
/// subscription/order identifier, then provider-internal id coerced to string.
fn extract_reference(data: &Value) -> Option<String> {
    if let Some(s) = data["reference"].as_str().filter(|s| !s.is_empty()) {
        return Some(s.to_string());
    }
    for key in ["subscription_code", "order_id"] {
        if let Some(s) = data[key].as_str().filter(|s| !s.is_empty()) {
            return Some(s.to_string());
        }
    }
    match &data["id"] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Resolves the requested extension: explicit days, else months x 30, else the
/// default. Values <= 0 are treated as absent.
pub fn extension_days_from(days: Option<i64>, months: Option<i64>) -> i64 {
    days.filter(|d| *d > 0)
        .or_else(|| months.filter(|m| *m > 0).map(|m| m.saturating_mul(30)))
        .unwrap_or(DEFAULT_EXTENSION_DAYS)
}

// Providers send day counts as numbers or numeric strings.
fn as_day_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
