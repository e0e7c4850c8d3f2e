use async_trait::async_trait;
use sqlx::Row;
use tracing::warn;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::reconciliation::PlanRecordRepoTrait,
    domain::entities::plan::Plan,
};

#[async_trait]
impl PlanRecordRepoTrait for PostgresPersistence {
    async fn find_plan(&self, auth_subject_id: &str) -> AppResult<Option<Plan>> {
        let row = sqlx::query("SELECT plan FROM subscriptions WHERE auth_subject_id = $1")
            .bind(auth_subject_id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;

        Ok(row.and_then(|row| {
            let raw: String = row.get("plan");
            raw.parse::<Plan>()
                .inspect_err(|_| warn!(auth_subject_id, plan = %raw, "Unknown recorded plan"))
                .ok()
        }))
    }

    async fn save_plan(
        &self,
        auth_subject_id: &str,
        processor_customer_id: &str,
        plan: Plan,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (auth_subject_id, processor_customer_id, plan)
            VALUES ($1, $2, $3)
            ON CONFLICT (auth_subject_id) DO UPDATE
            SET plan = EXCLUDED.plan,
                processor_customer_id = EXCLUDED.processor_customer_id,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(auth_subject_id)
        .bind(processor_customer_id)
        .bind(plan.as_str())
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
