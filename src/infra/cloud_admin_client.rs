use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{error, warn};

use crate::app_error::{AppError, AppResult};
use crate::application::ports::cloud_admin::EntitlementApi;
use crate::domain::entities::plan::Plan;
use crate::infra::credential_cache::CredentialCache;

#[derive(Debug, Serialize)]
struct UpdateSubscriptionRequest<'a> {
    subject_id: &'a str,
    subscription_plan: Plan,
}

/// Client for the cloud platform's admin API.
pub struct CloudAdminClient {
    client: Client,
    update_sub_url: String,
    credentials: Arc<CredentialCache>,
}

impl CloudAdminClient {
    pub fn new(client: Client, cloud_domain: &str, credentials: Arc<CredentialCache>) -> Self {
        Self {
            client,
            update_sub_url: format!("https://{}/admin/v1alpha1/users/update-sub", cloud_domain),
            credentials,
        }
    }
}

#[async_trait]
impl EntitlementApi for CloudAdminClient {
    async fn update_plan(&self, auth_subject_id: &str, plan: Plan) -> AppResult<u16> {
        let token = self.credentials.token().await?;

        let response = self
            .client
            .post(&self.update_sub_url)
            .bearer_auth(token.expose_secret())
            .json(&UpdateSubscriptionRequest {
                subject_id: auth_subject_id,
                subscription_plan: plan,
            })
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Entitlement request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Cloud credential rejected, invalidating cache");
            self.credentials.invalidate().await;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, auth_subject_id, "Failed to update entitlement");
            return Err(AppError::Upstream(format!(
                "Entitlement API returned {}",
                status
            )));
        }

        Ok(status.as_u16())
    }
}
