//! The reconciliation path: identity resolution, the idempotency guard and the
//! entitlement mutation for one canonical payment event.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::application::app_error::AppResult;
use crate::application::normalizer::{DEFAULT_EXTENSION_DAYS, Normalized};
use crate::domain::entities::entitlement::Entitlement;
use crate::domain::entities::ledger_entry::PaymentLedgerEntry;
use crate::domain::entities::payment_event::PaymentEvent;

/// One fully-resolved entitlement mutation, handed to the store to execute
/// under its transaction.
#[derive(Debug, Clone)]
pub struct ApplyPaymentCommand {
    /// Event with `account_id` set.
    pub event: PaymentEvent,
    pub extension_days: i64,
    pub now_ms: i64,
}

/// Result of the transactional guard-plus-update.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(Entitlement),
    /// The reference was already applied; the entitlement was not touched.
    AlreadyProcessed,
}

/// Storage operations the reconciliation path needs.
///
/// `apply_success` is the only mutation on the success path and must run the
/// guard, the entitlement read, [`Entitlement::apply_payment`] and both writes
/// inside one store transaction, re-evaluating the guard on any automatic
/// transaction retry.
#[async_trait]
pub trait ReconciliationRepo: Send + Sync {
    async fn get_ledger_entry(&self, reference: &str) -> AppResult<Option<PaymentLedgerEntry>>;

    /// Records a non-success event minimally. Keeps `processed = false` and
    /// never overwrites an existing row for the reference.
    async fn record_ignored(&self, event: &PaymentEvent, now_ms: i64) -> AppResult<()>;

    /// Persists an unresolvable event for manual reconciliation.
    async fn record_unresolved(&self, event: &PaymentEvent, now_ms: i64) -> AppResult<()>;

    /// Looks up an account by contact email; `None` unless exactly one matches.
    async fn find_account_id_by_email(&self, email: &str) -> AppResult<Option<String>>;

    async fn apply_success(&self, cmd: &ApplyPaymentCommand) -> AppResult<ApplyOutcome>;
}

/// Classified outcome of one inbound event, mapped to a response by the
/// transport layer.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    Applied(Entitlement),
    AlreadyProcessed,
    Ignored { event_type: String },
    Dropped { reason: &'static str },
    Unresolved,
}

#[derive(Clone)]
pub struct ReconcileUseCases {
    repo: Arc<dyn ReconciliationRepo>,
}

impl ReconcileUseCases {
    pub fn new(repo: Arc<dyn ReconciliationRepo>) -> Self {
        Self { repo }
    }

    pub async fn reconcile(&self, normalized: Normalized) -> AppResult<ReconcileOutcome> {
        self.reconcile_at(normalized, Utc::now().timestamp_millis())
            .await
    }

    pub async fn reconcile_at(
        &self,
        normalized: Normalized,
        now_ms: i64,
    ) -> AppResult<ReconcileOutcome> {
        let event = match normalized {
            Normalized::Drop(reason) => {
                warn!(reason = reason.as_str(), "Dropping unclassifiable payment event");
                return Ok(ReconcileOutcome::Dropped {
                    reason: reason.as_str(),
                });
            }
            Normalized::Ignored(event) => {
                self.repo.record_ignored(&event, now_ms).await?;
                info!(
                    reference = %event.reference,
                    event_type = %event.event_type,
                    "Recorded ignored payment event"
                );
                return Ok(ReconcileOutcome::Ignored {
                    event_type: event.event_type,
                });
            }
            Normalized::Success(event) => event,
        };

        // Cheap pre-check; the authoritative guard runs inside the store
        // transaction in apply_success.
        if let Some(entry) = self.repo.get_ledger_entry(&event.reference).await? {
            if entry.processed {
                return Ok(ReconcileOutcome::AlreadyProcessed);
            }
        }

        let mut event = event;
        event.account_id = match self.resolve_account(&event).await? {
            Some(account_id) => Some(account_id),
            None => {
                self.repo.record_unresolved(&event, now_ms).await?;
                warn!(
                    reference = %event.reference,
                    provider = event.provider.as_str(),
                    "Could not resolve account for payment event; left for manual reconciliation"
                );
                return Ok(ReconcileOutcome::Unresolved);
            }
        };

        let extension_days = event
            .requested_extension_days
            .unwrap_or(DEFAULT_EXTENSION_DAYS);
        let cmd = ApplyPaymentCommand {
            event,
            extension_days,
            now_ms,
        };

        match self.repo.apply_success(&cmd).await? {
            ApplyOutcome::Applied(entitlement) => {
                info!(
                    reference = %cmd.event.reference,
                    account_id = %entitlement.account_id,
                    expires_at = ?entitlement.expires_at,
                    "Applied payment to entitlement"
                );
                Ok(ReconcileOutcome::Applied(entitlement))
            }
            ApplyOutcome::AlreadyProcessed => Ok(ReconcileOutcome::AlreadyProcessed),
        }
    }

    /// Resolution order: id embedded in event metadata, then unique contact
    /// email match.
    async fn resolve_account(&self, event: &PaymentEvent) -> AppResult<Option<String>> {
        if let Some(account_id) = event.account_id.as_ref().filter(|s| !s.is_empty()) {
            return Ok(Some(account_id.clone()));
        }
        match event.contact_email.as_deref().filter(|s| !s.is_empty()) {
            Some(email) => self.repo.find_account_id_by_email(email).await,
            None => Ok(None),
        }
    }
}
