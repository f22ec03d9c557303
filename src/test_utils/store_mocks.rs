//! In-memory implementation of the persistence traits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        reconcile::{ApplyOutcome, ApplyPaymentCommand, ReconciliationRepo},
        sweep::{EntitlementSweepRepo, ExpiryField, SweepCandidate, SweepCursor},
    },
    domain::entities::{
        entitlement::{Entitlement, PaymentApplication, Plan},
        ledger_entry::{LedgerStatus, PaymentLedgerEntry},
        payment_event::PaymentEvent,
    },
};

#[derive(Default)]
struct StoreInner {
    /// account_id -> contact email
    accounts: HashMap<String, String>,
    /// reference -> ledger row
    ledger: HashMap<String, PaymentLedgerEntry>,
    /// account_id -> entitlement row
    entitlements: HashMap<String, Entitlement>,
}

/// One mutex over all tables: `apply_success` runs its guard and both writes
/// under a single lock, matching the transactional store's atomicity.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
    fail_storage: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every repo call fail, simulating a store outage. The direct
    /// helpers below stay usable for assertions.
    pub fn set_storage_failing(&self, failing: bool) {
        self.fail_storage.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> AppResult<()> {
        if self.fail_storage.load(Ordering::SeqCst) {
            return Err(AppError::Database("Database operation failed".into()));
        }
        Ok(())
    }

    pub fn insert_account(&self, account_id: &str, email: &str) {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .insert(account_id.to_string(), email.to_string());
    }

    pub fn insert_premium(&self, account_id: &str, expires_at: i64) -> Entitlement {
        let entitlement = Entitlement {
            account_id: account_id.to_string(),
            plan: Plan::Premium,
            activated_at: Some(0),
            expires_at: Some(expires_at),
            premium_until: None,
            valid_until: None,
            last_payment_ref: None,
            last_payment_at: None,
            source: None,
            updated_at: Some(0),
        };
        self.put_entitlement(entitlement.clone());
        entitlement
    }

    /// Premium row with the expiry in one of the legacy field locations.
    pub fn insert_premium_legacy(&self, account_id: &str, field: ExpiryField, expires_at: i64) {
        let mut entitlement = self.insert_premium(account_id, 0);
        entitlement.expires_at = None;
        match field {
            ExpiryField::ExpiresAt => entitlement.expires_at = Some(expires_at),
            ExpiryField::PremiumUntil => entitlement.premium_until = Some(expires_at),
            ExpiryField::ValidUntil => entitlement.valid_until = Some(expires_at),
        }
        self.put_entitlement(entitlement);
    }

    pub fn put_entitlement(&self, entitlement: Entitlement) {
        self.inner
            .lock()
            .unwrap()
            .entitlements
            .insert(entitlement.account_id.clone(), entitlement);
    }

    pub fn entitlement(&self, account_id: &str) -> Option<Entitlement> {
        self.inner.lock().unwrap().entitlements.get(account_id).cloned()
    }

    pub fn entitlement_count(&self) -> usize {
        self.inner.lock().unwrap().entitlements.len()
    }

    pub fn ledger_entry(&self, reference: &str) -> Option<PaymentLedgerEntry> {
        self.inner.lock().unwrap().ledger.get(reference).cloned()
    }

    pub fn ledger_len(&self) -> usize {
        self.inner.lock().unwrap().ledger.len()
    }
}

fn ledger_row(
    event: &PaymentEvent,
    status: LedgerStatus,
    processed: bool,
    now_ms: i64,
) -> PaymentLedgerEntry {
    PaymentLedgerEntry {
        reference: event.reference.clone(),
        account_id: event.account_id.clone(),
        provider: event.provider,
        event_type: event.event_type.clone(),
        status,
        processed,
        amount_minor: event.amount_minor,
        currency: event.currency.clone(),
        raw_status: event.raw_status.clone(),
        created_at: now_ms,
        processed_at: processed.then_some(now_ms),
    }
}

#[async_trait]
impl ReconciliationRepo for InMemoryStore {
    async fn get_ledger_entry(&self, reference: &str) -> AppResult<Option<PaymentLedgerEntry>> {
        self.check_available()?;
        Ok(self.inner.lock().unwrap().ledger.get(reference).cloned())
    }

    async fn record_ignored(&self, event: &PaymentEvent, now_ms: i64) -> AppResult<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .ledger
            .entry(event.reference.clone())
            .or_insert_with(|| ledger_row(event, LedgerStatus::Ignored, false, now_ms));
        Ok(())
    }

    async fn record_unresolved(&self, event: &PaymentEvent, now_ms: i64) -> AppResult<()> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        match inner.ledger.get_mut(&event.reference) {
            Some(existing) if existing.processed => {}
            Some(existing) => {
                existing.status = LedgerStatus::Unresolved;
                existing.event_type = event.event_type.clone();
            }
            None => {
                let row = ledger_row(event, LedgerStatus::Unresolved, false, now_ms);
                inner.ledger.insert(event.reference.clone(), row);
            }
        }
        Ok(())
    }

    async fn find_account_id_by_email(&self, email: &str) -> AppResult<Option<String>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();
        let mut matches = inner
            .accounts
            .iter()
            .filter(|(_, e)| e.eq_ignore_ascii_case(email))
            .map(|(id, _)| id.clone());

        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(Some(id)),
            _ => Ok(None),
        }
    }

    async fn apply_success(&self, cmd: &ApplyPaymentCommand) -> AppResult<ApplyOutcome> {
        self.check_available()?;
        let account_id = cmd
            .event
            .account_id
            .as_deref()
            .expect("apply_success requires a resolved account");

        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner.ledger.get(&cmd.event.reference) {
            if existing.processed {
                return Ok(ApplyOutcome::AlreadyProcessed);
            }
        }

        let row = ledger_row(&cmd.event, LedgerStatus::Success, true, cmd.now_ms);
        inner.ledger.insert(cmd.event.reference.clone(), row);

        let current = inner.entitlements.get(account_id).cloned();
        let next = Entitlement::apply_payment(
            current.as_ref(),
            &PaymentApplication {
                account_id,
                reference: &cmd.event.reference,
                provider: cmd.event.provider,
                extension_days: cmd.extension_days,
                provider_expires_at: cmd.event.provider_expires_at,
                now_ms: cmd.now_ms,
            },
        );
        inner.entitlements.insert(account_id.to_string(), next.clone());

        Ok(ApplyOutcome::Applied(next))
    }
}

#[async_trait]
impl EntitlementSweepRepo for InMemoryStore {
    async fn expired_premium_page(
        &self,
        field: ExpiryField,
        now_ms: i64,
        cursor: Option<&SweepCursor>,
        limit: i64,
    ) -> AppResult<Vec<SweepCandidate>> {
        self.check_available()?;
        let inner = self.inner.lock().unwrap();

        let field_value = |e: &Entitlement| match field {
            ExpiryField::ExpiresAt => e.expires_at,
            ExpiryField::PremiumUntil => e.premium_until,
            ExpiryField::ValidUntil => e.valid_until,
        };

        let mut page: Vec<SweepCandidate> = inner
            .entitlements
            .values()
            .filter(|e| e.plan == Plan::Premium)
            .filter_map(|e| {
                field_value(e)
                    .filter(|v| *v <= now_ms)
                    .map(|v| SweepCandidate {
                        account_id: e.account_id.clone(),
                        expires_at: v,
                    })
            })
            .filter(|c| match cursor {
                Some(cur) => (c.expires_at, c.account_id.as_str()) > (cur.expires_at, cur.account_id.as_str()),
                None => true,
            })
            .collect();

        page.sort_by(|a, b| {
            (a.expires_at, a.account_id.as_str()).cmp(&(b.expires_at, b.account_id.as_str()))
        });
        page.truncate(limit.max(0) as usize);
        Ok(page)
    }

    async fn downgrade_to_free(&self, account_ids: &[String], now_ms: i64) -> AppResult<u64> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        let mut downgraded = 0;
        for account_id in account_ids {
            if let Some(entitlement) = inner.entitlements.get_mut(account_id) {
                if entitlement.plan == Plan::Premium {
                    entitlement.plan = Plan::Free;
                    entitlement.updated_at = Some(now_ms);
                    downgraded += 1;
                }
            }
        }
        Ok(downgraded)
    }
}
