use serde::Serialize;

use super::payment_event::Provider;

pub const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Plan::Free),
            "premium" => Some(Plan::Premium),
            _ => None,
        }
    }
}

/// Per-account entitlement record.
///
/// `premium_until` and `valid_until` are legacy locations for the expiry left
/// behind by earlier schema versions. Reads coalesce them via
/// [`Entitlement::effective_expires_at`]; every write through
/// [`Entitlement::apply_payment`] moves the value to `expires_at` and clears
/// the legacy columns.
#[derive(Debug, Clone)]
pub struct Entitlement {
    pub account_id: String,
    pub plan: Plan,
    /// First activation timestamp. Write-once: never overwritten once set.
    pub activated_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub premium_until: Option<i64>,
    pub valid_until: Option<i64>,
    pub last_payment_ref: Option<String>,
    pub last_payment_at: Option<i64>,
    pub source: Option<Provider>,
    pub updated_at: Option<i64>,
}

/// Inputs for one entitlement mutation, already resolved and deduplicated.
#[derive(Debug, Clone)]
pub struct PaymentApplication<'a> {
    pub account_id: &'a str,
    pub reference: &'a str,
    pub provider: Provider,
    pub extension_days: i64,
    /// Authoritative provider-reported expiry, if any.
    pub provider_expires_at: Option<i64>,
    pub now_ms: i64,
}

impl Entitlement {
    /// The single expiry value this record currently represents, coalesced
    /// across the canonical and legacy field locations.
    pub fn effective_expires_at(&self) -> Option<i64> {
        [self.expires_at, self.premium_until, self.valid_until]
            .into_iter()
            .flatten()
            .max()
    }

    /// Extend-from-max: the remaining time of an active entitlement is
    /// preserved and stacked; a lapsed one restarts from now. Saturating, so
    /// an absurd day count clamps at the i64 horizon instead of wrapping.
    pub fn extend_from_max(current_expires_at: Option<i64>, now_ms: i64, extension_days: i64) -> i64 {
        let base = current_expires_at.unwrap_or(now_ms).max(now_ms);
        base.saturating_add(extension_days.max(0).saturating_mul(DAY_MS))
    }

    /// Computes the successor state for one successful payment. Pure; callers
    /// run it inside their store transaction so the read it was derived from
    /// and the write commit together.
    ///
    /// A provider-reported expiry is taken verbatim when it is still in the
    /// future; otherwise (clock skew, stale provider data) extend-from-max is
    /// the fallback.
    pub fn apply_payment(current: Option<&Entitlement>, input: &PaymentApplication<'_>) -> Entitlement {
        let current_expiry = current.and_then(|e| e.effective_expires_at());
        let stacked = Self::extend_from_max(current_expiry, input.now_ms, input.extension_days);

        let new_expiry = match input.provider_expires_at {
            Some(provider) if provider > input.now_ms => provider,
            _ => stacked,
        };

        Entitlement {
            account_id: input.account_id.to_string(),
            plan: Plan::Premium,
            activated_at: current
                .and_then(|e| e.activated_at)
                .or(Some(input.now_ms)),
            expires_at: Some(new_expiry),
            premium_until: None,
            valid_until: None,
            last_payment_ref: Some(input.reference.to_string()),
            last_payment_at: Some(input.now_ms),
            source: Some(input.provider),
            updated_at: Some(input.now_ms),
        }
    }
}
