//! Access-token verification against the identity provider's JWKS.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode_header};
use reqwest::Client;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::app_error::{AppError, AppResult};
use crate::application::jwt::{
    AccessTokenVerifier, AuthenticatedUser, decode_claims, user_from_claims, validation,
};

/// Keys older than this are refetched before use.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

pub struct JwksVerifier {
    client: Client,
    jwks_url: String,
    validation: Validation,
    email_claim: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(client: Client, auth_domain: &str, audience: &str, email_claim: String) -> Self {
        Self::from_parts(
            client,
            format!("https://{}/.well-known/jwks.json", auth_domain),
            validation(Algorithm::RS256, &format!("https://{}/", auth_domain), audience),
            email_claim,
            None,
        )
    }

    fn from_parts(
        client: Client,
        jwks_url: String,
        validation: Validation,
        email_claim: String,
        keys: Option<JwkSet>,
    ) -> Self {
        Self {
            client,
            jwks_url,
            validation,
            email_claim,
            cache: RwLock::new(keys.map(|keys| CachedKeys {
                keys,
                fetched_at: Instant::now(),
            })),
        }
    }

    async fn fetch_keys(&self) -> AppResult<JwkSet> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            error!(status = %response.status(), "Failed to fetch JWKS");
            return Err(AppError::Upstream("Failed to fetch JWKS".into()));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse JWKS: {}", e)))
    }

    /// Decoding key for `kid`, refreshing the key set once if it is stale or lacks the key.
    async fn decoding_key(&self, kid: &str) -> AppResult<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return key_from_jwk(jwk);
                    }
                }
            }
        }

        debug!(kid, "Refreshing JWKS");
        let keys = self.fetch_keys().await?;
        let key = keys.find(kid).map(key_from_jwk);

        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key.unwrap_or_else(|| {
            Err(AppError::NotAuthenticated(format!(
                "No signing key found for kid {}",
                kid
            )))
        })
    }
}

fn key_from_jwk(jwk: &jsonwebtoken::jwk::Jwk) -> AppResult<DecodingKey> {
    DecodingKey::from_jwk(jwk)
        .map_err(|e| AppError::NotAuthenticated(format!("Unusable signing key: {}", e)))
}

#[async_trait]
impl AccessTokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let header = decode_header(token)
            .map_err(|e| AppError::NotAuthenticated(format!("Invalid token header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::NotAuthenticated("Missing kid in token header".into()))?;

        let key = self.decoding_key(&kid).await?;
        let claims = decode_claims(token, &key, &self.validation)?;
        user_from_claims(&claims, &self.email_claim)
    }
}
