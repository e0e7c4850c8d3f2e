use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::error;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::cloud_admin::CredentialSource;

/// Obtains admin API tokens through the identity provider's `refresh_token` grant.
pub struct OAuthRefreshSource {
    client: Client,
    token_url: String,
    client_id: String,
    refresh_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: Option<String>,
    #[allow(dead_code)]
    expires_in: Option<i64>,
}

impl OAuthRefreshSource {
    pub fn new(
        client: Client,
        auth_domain: &str,
        client_id: String,
        refresh_token: SecretString,
    ) -> Self {
        Self {
            client,
            token_url: format!("https://{}/oauth/token", auth_domain),
            client_id,
            refresh_token,
        }
    }
}

#[async_trait]
impl CredentialSource for OAuthRefreshSource {
    async fn fetch_token(&self) -> AppResult<SecretString> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", self.refresh_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Failed to refresh cloud credential");
            return Err(AppError::Upstream(format!(
                "Token endpoint returned {}",
                status
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse token response: {}", e)))?;
        Ok(SecretString::from(token.access_token))
    }
}
