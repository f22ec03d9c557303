//! Postgres implementation of the sweep queries.
//!
//! Each pass is a keyset-paginated range scan over one expiry field, backed by
//! the partial `(plan, <field>)` indexes from the schema. The column name is
//! interpolated from a fixed enum, never from input.

use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::sweep::{
        EntitlementSweepRepo, ExpiryField, SweepCandidate, SweepCursor,
    },
    domain::entities::entitlement::Plan,
};

#[async_trait]
impl EntitlementSweepRepo for PostgresPersistence {
    async fn expired_premium_page(
        &self,
        field: ExpiryField,
        now_ms: i64,
        cursor: Option<&SweepCursor>,
        limit: i64,
    ) -> AppResult<Vec<SweepCandidate>> {
        let col = field.column();

        let rows = match cursor {
            Some(cursor) => {
                let sql = format!(
                    r#"
                    SELECT account_id, {col} AS field_expires_at
                    FROM entitlements
                    WHERE plan = $1 AND {col} IS NOT NULL AND {col} <= $2
                      AND ({col}, account_id) > ($3, $4)
                    ORDER BY {col}, account_id
                    LIMIT $5
                    "#
                );
                sqlx::query(&sql)
                    .bind(Plan::Premium.as_str())
                    .bind(now_ms)
                    .bind(cursor.expires_at)
                    .bind(&cursor.account_id)
                    .bind(limit)
                    .fetch_all(self.pool())
                    .await
            }
            None => {
                let sql = format!(
                    r#"
                    SELECT account_id, {col} AS field_expires_at
                    FROM entitlements
                    WHERE plan = $1 AND {col} IS NOT NULL AND {col} <= $2
                    ORDER BY {col}, account_id
                    LIMIT $3
                    "#
                );
                sqlx::query(&sql)
                    .bind(Plan::Premium.as_str())
                    .bind(now_ms)
                    .bind(limit)
                    .fetch_all(self.pool())
                    .await
            }
        }
        .map_err(AppError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| SweepCandidate {
                account_id: row.get("account_id"),
                expires_at: row.get("field_expires_at"),
            })
            .collect())
    }

    async fn downgrade_to_free(&self, account_ids: &[String], now_ms: i64) -> AppResult<u64> {
        if account_ids.is_empty() {
            return Ok(0);
        }

        // Single batched merge; expiry fields are preserved for audit history.
        let result = sqlx::query(
            r#"
            UPDATE entitlements
            SET plan = $1, updated_at = $2
            WHERE account_id = ANY($3) AND plan = $4
            "#,
        )
        .bind(Plan::Free.as_str())
        .bind(now_ms)
        .bind(account_ids)
        .bind(Plan::Premium.as_str())
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected())
    }
}
