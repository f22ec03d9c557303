use serde::Serialize;

use super::payment_event::Provider;

/// Outcome recorded for a payment reference.
///
/// `Ignored` and `Unresolved` rows keep `processed = false` so that a later
/// genuine success for the same reference can still be applied; only
/// `processed = true` freezes the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Pending,
    Success,
    Ignored,
    Unresolved,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Success => "success",
            LedgerStatus::Ignored => "ignored",
            LedgerStatus::Unresolved => "unresolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LedgerStatus::Pending),
            "success" => Some(LedgerStatus::Success),
            "ignored" => Some(LedgerStatus::Ignored),
            "unresolved" => Some(LedgerStatus::Unresolved),
            _ => None,
        }
    }
}

/// Durable record of a single payment reference's lifetime. Exactly one row
/// exists per reference; immutable once `processed = true`.
#[derive(Debug, Clone)]
pub struct PaymentLedgerEntry {
    pub reference: String,
    pub account_id: Option<String>,
    pub provider: Provider,
    pub event_type: String,
    pub status: LedgerStatus,
    pub processed: bool,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub raw_status: Option<String>,
    pub created_at: i64,
    pub processed_at: Option<i64>,
}
