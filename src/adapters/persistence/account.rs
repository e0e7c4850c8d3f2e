use async_trait::async_trait;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::account::AccountRepoTrait,
    domain::entities::account::Account,
};

fn row_to_account(row: sqlx::postgres::PgRow) -> Account {
    Account {
        auth_subject_id: row.get("auth_subject_id"),
        email: row.get("email"),
        processor_customer_id: row.get("processor_customer_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = "auth_subject_id, email, processor_customer_id, created_at, updated_at";

#[async_trait]
impl AccountRepoTrait for PostgresPersistence {
    async fn find_by_auth_subject(&self, auth_subject_id: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE auth_subject_id = $1",
            SELECT_COLS
        ))
        .bind(auth_subject_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_account))
    }

    async fn find_by_customer_id(&self, processor_customer_id: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE processor_customer_id = $1 LIMIT 1",
            SELECT_COLS
        ))
        .bind(processor_customer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_account))
    }

    async fn insert_if_absent(
        &self,
        auth_subject_id: &str,
        processor_customer_id: &str,
        email: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (auth_subject_id, email, processor_customer_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (auth_subject_id) DO NOTHING
            "#,
        )
        .bind(auth_subject_id)
        .bind(email)
        .bind(processor_customer_id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() == 1)
    }
}
