use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use tracing::warn;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::reconciliation_runner::ReconciliationRunRepoTrait,
    domain::entities::reconciliation_run::{ReconciliationInput, ReconciliationRun, RunStatus},
};

fn row_to_run(row: sqlx::postgres::PgRow) -> ReconciliationRun {
    let event_id: String = row.get("event_id");
    let raw_status: String = row.get("status");
    let status = raw_status.parse().unwrap_or_else(|_| {
        warn!(event_id = %event_id, status = %raw_status, "Unknown run status, treating as pending");
        RunStatus::Pending
    });

    ReconciliationRun {
        input: ReconciliationInput {
            subscription_id: row.get("subscription_id"),
            customer_id: row.get("customer_id"),
        },
        event_id,
        status,
        attempts: row.get("attempts"),
        outcome: row.get("outcome"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    event_id, subscription_id, customer_id, status, attempts,
    outcome, last_error, created_at, updated_at
"#;

#[async_trait]
impl ReconciliationRunRepoTrait for PostgresPersistence {
    async fn insert_pending(
        &self,
        event_id: &str,
        input: &ReconciliationInput,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO reconciliation_runs (event_id, subscription_id, customer_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(&input.subscription_id)
        .bind(&input.customer_id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_completed(&self, event_id: &str, outcome: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE reconciliation_runs
            SET status = 'completed', outcome = $2, last_error = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(outcome)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_failed(&self, event_id: &str, error: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE reconciliation_runs
            SET status = 'failed', last_error = $2, updated_at = CURRENT_TIMESTAMP
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(error)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn claim_stale(
        &self,
        stale_after: Duration,
        limit: i64,
    ) -> AppResult<Vec<ReconciliationRun>> {
        // SKIP LOCKED keeps concurrent recovery passes from claiming the same rows.
        let rows = sqlx::query(&format!(
            r#"
            UPDATE reconciliation_runs
            SET attempts = attempts + 1, updated_at = CURRENT_TIMESTAMP
            WHERE event_id IN (
                SELECT event_id FROM reconciliation_runs
                WHERE status = 'pending'
                  AND updated_at < CURRENT_TIMESTAMP - make_interval(secs => $1)
                ORDER BY updated_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(stale_after.as_secs_f64())
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_run).collect())
    }
}
