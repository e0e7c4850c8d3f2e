use chrono::NaiveDateTime;
use serde::Serialize;

/// Mapping between an identity-provider subject and its Stripe customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub auth_subject_id: String,
    pub email: String,
    pub processor_customer_id: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
