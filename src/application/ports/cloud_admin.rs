use async_trait::async_trait;
use secrecy::SecretString;

use crate::app_error::AppResult;
use crate::domain::entities::plan::Plan;

/// Admin API of the cloud platform that stores user entitlements.
#[async_trait]
pub trait EntitlementApi: Send + Sync {
    /// Set the subscription plan of `auth_subject_id`; returns the HTTP status code.
    async fn update_plan(&self, auth_subject_id: &str, plan: Plan) -> AppResult<u16>;
}

/// Issues access tokens authorizing calls to the admin API.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch_token(&self) -> AppResult<SecretString>;
}
