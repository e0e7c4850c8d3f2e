use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::infra::error::InfraError;

pub struct SlackConfig {
    pub token: SecretString,
    pub channel: String,
}

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub cors_origins: Vec<HeaderValue>,
    pub stripe_secret_key: SecretString,
    pub stripe_webhook_secret: SecretString,
    /// Price id of the pro plan; subscriptions to other prices are ignored.
    pub stripe_pro_price: String,
    pub default_success_url: Url,
    pub default_cancel_url: Url,
    pub default_return_url: Url,
    /// Host of the cloud admin API (e.g. "cloud.example.com").
    pub cloud_domain: String,
    /// Host of the identity provider, used for JWKS, issuer and token refresh.
    pub auth_domain: String,
    pub auth_audience: String,
    /// Claim holding the user's email in access tokens.
    pub auth_email_claim: String,
    pub oauth_client_id: String,
    pub oauth_refresh_token: SecretString,
    pub credential_ttl: Duration,
    /// Plan-change notifications are disabled when unset.
    pub slack: Option<SlackConfig>,
    /// Auth subject whose plan changes are never announced (e.g. a test account).
    pub notify_skip_user: Option<String>,
    pub run_recovery_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let bind_addr: SocketAddr =
            get_env_default("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)));
        let database_url: String = get_env("DATABASE_URL");

        let cors_origins = parse_origins(&get_env_default(
            "CORS_ORIGINS",
            String::from("http://localhost:3000"),
        ))?;

        let stripe_secret_key = SecretString::from(get_env::<String>("STRIPE_SECRET_KEY"));
        let stripe_webhook_secret = SecretString::from(get_env::<String>("STRIPE_WEBHOOK_SECRET"));
        let stripe_pro_price: String = get_env("STRIPE_PRO_PRICE");

        let default_success_url = url_with_default("DEFAULT_SUCCESS_URL", "http://localhost:3000/")?;
        let default_cancel_url =
            url_with_default("DEFAULT_CANCEL_URL", "http://localhost:3000/pricing")?;
        let default_return_url =
            url_with_default("DEFAULT_RETURN_URL", "http://localhost:3000/pricing")?;

        let cloud_domain: String = get_env("CLOUD_DOMAIN");
        let auth_domain: String = get_env("AUTH_DOMAIN");
        let auth_audience: String = get_env_default("AUTH_AUDIENCE", "cloud-api".to_string());
        let auth_email_claim: String = get_env_default("AUTH_EMAIL_CLAIM", "email".to_string());

        let oauth_client_id: String = get_env("OAUTH_CLIENT_ID");
        let oauth_refresh_token = SecretString::from(get_env::<String>("OAUTH_REFRESH_TOKEN"));
        let credential_ttl_secs: u64 = get_env_default("CREDENTIAL_TTL_SECS", 43_200);

        let slack = optional_env("SLACK_TOKEN").map(|token| SlackConfig {
            token: SecretString::from(token),
            channel: get_env_default("SLACK_CHANNEL", "#subscriptions".to_string()),
        });
        let notify_skip_user = optional_env("NOTIFY_SKIP_USER");

        let run_recovery_interval_secs: u64 = get_env_default("RUN_RECOVERY_INTERVAL_SECS", 300);

        Ok(Self {
            bind_addr,
            database_url,
            cors_origins,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_pro_price,
            default_success_url,
            default_cancel_url,
            default_return_url,
            cloud_domain,
            auth_domain,
            auth_audience,
            auth_email_claim,
            oauth_client_id,
            oauth_refresh_token,
            credential_ttl: Duration::from_secs(credential_ttl_secs),
            slack,
            notify_skip_user,
            run_recovery_interval: Duration::from_secs(run_recovery_interval_secs),
        })
    }

    /// Issuer expected in access tokens.
    pub fn auth_issuer(&self) -> String {
        format!("https://{}/", self.auth_domain)
    }
}

fn optional_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn url_with_default(var: &'static str, default: &str) -> Result<Url, InfraError> {
    let raw: String = get_env_default(var, default.to_string());
    Url::parse(&raw).map_err(|e| InfraError::InvalidConfig {
        var,
        reason: e.to_string(),
    })
}

fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>, InfraError> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            // Credentials are allowed, so a wildcard origin is not.
            if origin == "*" {
                return Err(InfraError::InvalidConfig {
                    var: "CORS_ORIGINS",
                    reason: "wildcard origin is not allowed".into(),
                });
            }
            origin.parse().map_err(|_| InfraError::InvalidConfig {
                var: "CORS_ORIGINS",
                reason: format!("invalid origin {}", origin),
            })
        })
        .collect()
}
