//! Periodic downgrade of lapsed premium entitlements.
//!
//! Runs one bounded, keyset-paginated pass per known expiry field location.
//! Every page's filter excludes accounts already flipped to free, so a run is
//! idempotent and safely restartable from scratch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::application::app_error::AppResult;

pub const DEFAULT_SWEEP_PAGE_SIZE: i64 = 300;

/// Known storage locations for the expiry timestamp. `ExpiresAt` is canonical;
/// the other two are schema drift from earlier versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryField {
    ExpiresAt,
    PremiumUntil,
    ValidUntil,
}

impl ExpiryField {
    pub const ALL: [ExpiryField; 3] = [
        ExpiryField::ExpiresAt,
        ExpiryField::PremiumUntil,
        ExpiryField::ValidUntil,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            ExpiryField::ExpiresAt => "expires_at",
            ExpiryField::PremiumUntil => "premium_until",
            ExpiryField::ValidUntil => "valid_until",
        }
    }
}

/// Keyset position within one pass; never persisted across runs.
#[derive(Debug, Clone)]
pub struct SweepCursor {
    pub expires_at: i64,
    pub account_id: String,
}

#[derive(Debug, Clone)]
pub struct SweepCandidate {
    pub account_id: String,
    pub expires_at: i64,
}

#[async_trait]
pub trait EntitlementSweepRepo: Send + Sync {
    /// One page of accounts with `plan = premium` and the given expiry field
    /// at or before `now_ms`, ordered by `(field, account_id)` after `cursor`.
    async fn expired_premium_page(
        &self,
        field: ExpiryField,
        now_ms: i64,
        cursor: Option<&SweepCursor>,
        limit: i64,
    ) -> AppResult<Vec<SweepCandidate>>;

    /// Downgrades the given accounts to the free plan, leaving every expiry
    /// field untouched for audit history. Returns how many rows changed.
    async fn downgrade_to_free(&self, account_ids: &[String], now_ms: i64) -> AppResult<u64>;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    /// Candidates examined across all passes.
    pub processed: u64,
    /// Accounts actually flipped to free.
    pub downgrades: u64,
}

#[derive(Clone)]
pub struct SweepUseCases {
    repo: Arc<dyn EntitlementSweepRepo>,
    page_size: i64,
}

impl SweepUseCases {
    pub fn new(repo: Arc<dyn EntitlementSweepRepo>, page_size: i64) -> Self {
        Self {
            repo,
            page_size: page_size.max(1),
        }
    }

    pub async fn run(&self) -> AppResult<SweepReport> {
        self.run_at(Utc::now().timestamp_millis()).await
    }

    pub async fn run_at(&self, now_ms: i64) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();
        for field in ExpiryField::ALL {
            self.sweep_field(field, now_ms, &mut report).await?;
        }
        info!(
            processed = report.processed,
            downgrades = report.downgrades,
            "Entitlement sweep finished"
        );
        Ok(report)
    }

    async fn sweep_field(
        &self,
        field: ExpiryField,
        now_ms: i64,
        report: &mut SweepReport,
    ) -> AppResult<()> {
        let mut cursor: Option<SweepCursor> = None;
        loop {
            let page = self
                .repo
                .expired_premium_page(field, now_ms, cursor.as_ref(), self.page_size)
                .await?;
            let Some(last) = page.last() else {
                return Ok(());
            };
            cursor = Some(SweepCursor {
                expires_at: last.expires_at,
                account_id: last.account_id.clone(),
            });

            let account_ids: Vec<String> =
                page.iter().map(|c| c.account_id.clone()).collect();
            let downgraded = self.repo.downgrade_to_free(&account_ids, now_ms).await?;

            debug!(
                field = field.column(),
                page_len = page.len(),
                downgraded,
                "Swept entitlement page"
            );
            report.processed += page.len() as u64;
            report.downgrades += downgraded;
        }
    }
}
