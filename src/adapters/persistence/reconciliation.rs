//! Postgres implementation of the reconciliation store.
//!
//! The idempotency guard lives here: `apply_success` claims the ledger row,
//! reads and rewrites the entitlement and commits all of it in one
//! transaction. Serialization conflicts re-run the whole attempt, so the
//! guard is re-evaluated on every retry.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::warn;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::reconcile::{ApplyOutcome, ApplyPaymentCommand, ReconciliationRepo},
    domain::entities::{
        entitlement::{Entitlement, PaymentApplication, Plan},
        ledger_entry::{LedgerStatus, PaymentLedgerEntry},
        payment_event::{PaymentEvent, Provider},
    },
};

const MAX_TX_ATTEMPTS: u32 = 3;

fn row_to_ledger_entry(row: PgRow) -> PaymentLedgerEntry {
    let provider: String = row.get("provider");
    let status: String = row.get("status");
    PaymentLedgerEntry {
        reference: row.get("reference"),
        account_id: row.get("account_id"),
        provider: Provider::parse(&provider).unwrap_or(Provider::Gateway),
        event_type: row.get("event_type"),
        status: LedgerStatus::parse(&status).unwrap_or(LedgerStatus::Pending),
        processed: row.get("processed"),
        amount_minor: row.get("amount_minor"),
        currency: row.get("currency"),
        raw_status: row.get("raw_status"),
        created_at: row.get("created_at"),
        processed_at: row.get("processed_at"),
    }
}

pub(crate) fn row_to_entitlement(row: PgRow) -> Entitlement {
    let plan: String = row.get("plan");
    let source: Option<String> = row.get("source");
    Entitlement {
        account_id: row.get("account_id"),
        plan: Plan::parse(&plan).unwrap_or(Plan::Free),
        activated_at: row.get("activated_at"),
        expires_at: row.get("expires_at"),
        premium_until: row.get("premium_until"),
        valid_until: row.get("valid_until"),
        last_payment_ref: row.get("last_payment_ref"),
        last_payment_at: row.get("last_payment_at"),
        source: source.as_deref().and_then(Provider::parse),
        updated_at: row.get("updated_at"),
    }
}

/// Serialization failure or deadlock: the transaction is safe to re-run.
fn is_tx_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("40001") | Some("40P01")
        ),
        _ => false,
    }
}

#[async_trait]
impl ReconciliationRepo for PostgresPersistence {
    async fn get_ledger_entry(&self, reference: &str) -> AppResult<Option<PaymentLedgerEntry>> {
        let row = sqlx::query(
            r#"
            SELECT reference, account_id, provider, event_type, status, processed,
                   amount_minor, currency, raw_status, created_at, processed_at
            FROM payment_ledger
            WHERE reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_ledger_entry))
    }

    async fn record_ignored(&self, event: &PaymentEvent, now_ms: i64) -> AppResult<()> {
        // First sighting wins; an existing row for the reference is left alone.
        sqlx::query(
            r#"
            INSERT INTO payment_ledger
                (reference, account_id, provider, event_type, status, processed,
                 amount_minor, currency, raw_status, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7, $8, $9)
            ON CONFLICT (reference) DO NOTHING
            "#,
        )
        .bind(&event.reference)
        .bind(&event.account_id)
        .bind(event.provider.as_str())
        .bind(&event.event_type)
        .bind(LedgerStatus::Ignored.as_str())
        .bind(event.amount_minor)
        .bind(&event.currency)
        .bind(&event.raw_status)
        .bind(now_ms)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn record_unresolved(&self, event: &PaymentEvent, now_ms: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_ledger
                (reference, account_id, provider, event_type, status, processed,
                 amount_minor, currency, raw_status, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7, $8, $9)
            ON CONFLICT (reference) DO UPDATE SET
                status = EXCLUDED.status,
                event_type = EXCLUDED.event_type,
                amount_minor = COALESCE(EXCLUDED.amount_minor, payment_ledger.amount_minor),
                currency = COALESCE(EXCLUDED.currency, payment_ledger.currency),
                raw_status = COALESCE(EXCLUDED.raw_status, payment_ledger.raw_status)
            WHERE payment_ledger.processed = FALSE
            "#,
        )
        .bind(&event.reference)
        .bind(&event.account_id)
        .bind(event.provider.as_str())
        .bind(&event.event_type)
        .bind(LedgerStatus::Unresolved.as_str())
        .bind(event.amount_minor)
        .bind(&event.currency)
        .bind(&event.raw_status)
        .bind(now_ms)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn find_account_id_by_email(&self, email: &str) -> AppResult<Option<String>> {
        let rows = sqlx::query(
            "SELECT account_id FROM accounts WHERE lower(email) = lower($1) LIMIT 2",
        )
        .bind(email)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        // Constrained to exactly one match; an ambiguous email resolves nothing.
        match rows.as_slice() {
            [row] => Ok(Some(row.get("account_id"))),
            _ => Ok(None),
        }
    }

    async fn apply_success(&self, cmd: &ApplyPaymentCommand) -> AppResult<ApplyOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match try_apply_success(self.pool(), cmd).await {
                Err(e) if is_tx_conflict(&e) && attempt < MAX_TX_ATTEMPTS => {
                    warn!(
                        reference = %cmd.event.reference,
                        attempt,
                        "Reconciliation transaction conflict, retrying"
                    );
                }
                Err(e) => return Err(AppError::from(e)),
                Ok(outcome) => return Ok(outcome),
            }
        }
    }
}

async fn try_apply_success(
    pool: &PgPool,
    cmd: &ApplyPaymentCommand,
) -> Result<ApplyOutcome, sqlx::Error> {
    let account_id = cmd
        .event
        .account_id
        .as_deref()
        .expect("apply_success requires a resolved account");

    let mut tx = pool.begin().await?;

    // The guard: claim the ledger row for this reference. The conditional
    // update only fires while processed = FALSE, so a concurrent transaction
    // that committed first makes this claim return no row.
    let claimed = sqlx::query(
        r#"
        INSERT INTO payment_ledger
            (reference, account_id, provider, event_type, status, processed,
             amount_minor, currency, raw_status, created_at, processed_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $8, $9, $9)
        ON CONFLICT (reference) DO UPDATE SET
            account_id = COALESCE(payment_ledger.account_id, EXCLUDED.account_id),
            event_type = EXCLUDED.event_type,
            status = EXCLUDED.status,
            processed = TRUE,
            amount_minor = COALESCE(EXCLUDED.amount_minor, payment_ledger.amount_minor),
            currency = COALESCE(EXCLUDED.currency, payment_ledger.currency),
            raw_status = COALESCE(EXCLUDED.raw_status, payment_ledger.raw_status),
            processed_at = EXCLUDED.processed_at
        WHERE payment_ledger.processed = FALSE
        RETURNING reference
        "#,
    )
    .bind(&cmd.event.reference)
    .bind(account_id)
    .bind(cmd.event.provider.as_str())
    .bind(&cmd.event.event_type)
    .bind(LedgerStatus::Success.as_str())
    .bind(cmd.event.amount_minor)
    .bind(&cmd.event.currency)
    .bind(&cmd.event.raw_status)
    .bind(cmd.now_ms)
    .fetch_optional(&mut *tx)
    .await?;

    if claimed.is_none() {
        tx.rollback().await?;
        return Ok(ApplyOutcome::AlreadyProcessed);
    }

    let current = sqlx::query(
        r#"
        SELECT account_id, plan, activated_at, expires_at, premium_until, valid_until,
               last_payment_ref, last_payment_at, source, updated_at
        FROM entitlements
        WHERE account_id = $1
        FOR UPDATE
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(row_to_entitlement);

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

    sqlx::query(
        r#"
        INSERT INTO entitlements
            (account_id, plan, activated_at, expires_at, premium_until, valid_until,
             last_payment_ref, last_payment_at, source, updated_at)
        VALUES ($1, $2, $3, $4, NULL, NULL, $5, $6, $7, $8)
        ON CONFLICT (account_id) DO UPDATE SET
            plan = EXCLUDED.plan,
            activated_at = COALESCE(entitlements.activated_at, EXCLUDED.activated_at),
            expires_at = EXCLUDED.expires_at,
            premium_until = NULL,
            valid_until = NULL,
            last_payment_ref = EXCLUDED.last_payment_ref,
            last_payment_at = EXCLUDED.last_payment_at,
            source = EXCLUDED.source,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&next.account_id)
    .bind(next.plan.as_str())
    .bind(next.activated_at)
    .bind(next.expires_at)
    .bind(&next.last_payment_ref)
    .bind(next.last_payment_at)
    .bind(next.source.map(|s| s.as_str()))
    .bind(next.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ApplyOutcome::Applied(next))
}
