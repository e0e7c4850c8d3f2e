use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::account::Account;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait AccountRepoTrait: Send + Sync {
    async fn find_by_auth_subject(&self, auth_subject_id: &str) -> AppResult<Option<Account>>;

    async fn find_by_customer_id(&self, processor_customer_id: &str) -> AppResult<Option<Account>>;

    /// Insert the mapping unless the auth subject already has one.
    ///
    /// Returns `true` when a row was inserted, `false` when an existing row was kept.
    async fn insert_if_absent(
        &self,
        auth_subject_id: &str,
        processor_customer_id: &str,
        email: &str,
    ) -> AppResult<bool>;
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct AccountUseCases {
    repo: Arc<dyn AccountRepoTrait>,
}

impl AccountUseCases {
    pub fn new(repo: Arc<dyn AccountRepoTrait>) -> Self {
        Self { repo }
    }

    pub async fn find_customer_id(&self, auth_subject_id: &str) -> AppResult<Option<String>> {
        Ok(self
            .repo
            .find_by_auth_subject(auth_subject_id)
            .await?
            .map(|account| account.processor_customer_id))
    }

    /// Resolve the auth subject owning a processor customer.
    pub async fn find_auth_subject(&self, processor_customer_id: &str) -> AppResult<String> {
        match self.repo.find_by_customer_id(processor_customer_id).await? {
            Some(account) => Ok(account.auth_subject_id),
            None => {
                error!(customer_id = processor_customer_id, "No account for processor customer");
                Err(AppError::CustomerNotFound(format!(
                    "Cannot find auth user for processor customer {}",
                    processor_customer_id
                )))
            }
        }
    }

    /// Record the customer for a user and return the customer id now stored.
    ///
    /// When another request recorded a customer first, the stored id wins and is
    /// returned instead of `processor_customer_id`.
    pub async fn record_customer(
        &self,
        auth_subject_id: &str,
        processor_customer_id: &str,
        email: &str,
    ) -> AppResult<String> {
        let inserted = self
            .repo
            .insert_if_absent(auth_subject_id, processor_customer_id, email)
            .await?;

        if inserted {
            info!(
                auth_subject_id,
                customer_id = processor_customer_id,
                "Recorded processor customer"
            );
            return Ok(processor_customer_id.to_string());
        }

        let stored = self
            .repo
            .find_by_auth_subject(auth_subject_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Failed to record processor customer {} for user {}",
                    processor_customer_id, auth_subject_id
                ))
            })?;

        if stored.processor_customer_id != processor_customer_id {
            info!(
                auth_subject_id,
                kept = %stored.processor_customer_id,
                discarded = processor_customer_id,
                "User already mapped to another processor customer"
            );
        }
        Ok(stored.processor_customer_id)
    }
}
