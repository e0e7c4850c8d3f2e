use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::app_error::{AppError, AppResult};
use crate::application::ports::payment_processor::{CheckoutRequest, PaymentProcessor};
use crate::application::retry::{RetryPolicy, with_retry};
use crate::application::use_cases::account::AccountUseCases;

/// Retry schedule for processor calls made while a user waits on the response.
pub const SESSION_CALLS_RETRY: RetryPolicy = RetryPolicy::new(Duration::from_secs(10), 2, 1.0);

/// Redirect targets used when a request does not supply its own.
#[derive(Debug, Clone)]
pub struct RedirectDefaults {
    pub success_url: String,
    pub cancel_url: String,
    pub return_url: String,
}

/// Issues hosted checkout and billing-portal sessions for authenticated users.
#[derive(Clone)]
pub struct BillingSessionUseCases {
    accounts: Arc<AccountUseCases>,
    processor: Arc<dyn PaymentProcessor>,
    pro_price_id: String,
    defaults: RedirectDefaults,
    processor_retry: RetryPolicy,
}

impl BillingSessionUseCases {
    pub fn new(
        accounts: Arc<AccountUseCases>,
        processor: Arc<dyn PaymentProcessor>,
        pro_price_id: String,
        defaults: RedirectDefaults,
        processor_retry: RetryPolicy,
    ) -> Self {
        Self {
            accounts,
            processor,
            pro_price_id,
            defaults,
            processor_retry,
        }
    }

    /// Look up the user's processor customer, creating and recording one if needed.
    pub async fn ensure_customer(&self, auth_subject_id: &str, email: &str) -> AppResult<String> {
        if let Some(customer_id) = self.accounts.find_customer_id(auth_subject_id).await? {
            return Ok(customer_id);
        }

        let created = with_retry(&self.processor_retry, "create_customer", || {
            self.processor.create_customer(auth_subject_id, email)
        })
        .await?;
        info!(auth_subject_id, customer_id = %created, "Created processor customer");

        self.accounts
            .record_customer(auth_subject_id, &created, email)
            .await
    }

    /// Start a pro subscription checkout and return its URL.
    pub async fn create_checkout(
        &self,
        auth_subject_id: &str,
        email: &str,
        success_url: Option<String>,
        cancel_url: Option<String>,
    ) -> AppResult<String> {
        let customer_id = self.ensure_customer(auth_subject_id, email).await?;

        let request = CheckoutRequest {
            customer_id,
            price_id: self.pro_price_id.clone(),
            success_url: success_url.unwrap_or_else(|| self.defaults.success_url.clone()),
            cancel_url: cancel_url.unwrap_or_else(|| self.defaults.cancel_url.clone()),
        };

        let url = with_retry(&self.processor_retry, "create_checkout_session", || {
            self.processor.create_checkout_session(&request)
        })
        .await?;

        url.ok_or_else(|| {
            error!(auth_subject_id, "Processor returned a checkout session without URL");
            AppError::Upstream("Failed to create a checkout session".into())
        })
    }

    /// Open the billing portal for an existing customer and return its URL.
    pub async fn create_portal(
        &self,
        auth_subject_id: &str,
        return_url: Option<String>,
    ) -> AppResult<String> {
        let customer_id = self
            .accounts
            .find_customer_id(auth_subject_id)
            .await?
            .ok_or_else(|| {
                error!(auth_subject_id, "Cannot find processor customer for user");
                AppError::CustomerNotFound(format!(
                    "Cannot find processor customer for user {}",
                    auth_subject_id
                ))
            })?;

        let return_url = return_url.unwrap_or_else(|| self.defaults.return_url.clone());

        with_retry(&self.processor_retry, "create_portal_session", || {
            self.processor.create_portal_session(&customer_id, &return_url)
        })
        .await
    }
}
