//! Port for the payment processor (Stripe in production).

use async_trait::async_trait;

use crate::app_error::AppResult;
use crate::domain::entities::subscription::SubscriptionSnapshot;

/// Parameters of a hosted subscription checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a customer tagged with the auth subject.
    ///
    /// Implementations must be idempotent per `auth_subject_id`: repeated calls return
    /// the same customer id instead of creating duplicates.
    async fn create_customer(&self, auth_subject_id: &str, email: &str) -> AppResult<String>;

    async fn get_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionSnapshot>;

    /// Returns the hosted checkout URL, if the processor issued one.
    async fn create_checkout_session(&self, request: &CheckoutRequest)
    -> AppResult<Option<String>>;

    async fn create_portal_session(&self, customer_id: &str, return_url: &str)
    -> AppResult<String>;
}
