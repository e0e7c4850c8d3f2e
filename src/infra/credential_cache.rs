//! Cached access token for the cloud admin API.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::app_error::AppResult;
use crate::application::ports::cloud_admin::CredentialSource;

struct CachedToken {
    token: SecretString,
    fetched_at: Instant,
}

/// Single-slot token cache with TTL.
///
/// The slot lock is held across the refresh, so concurrent callers after expiry
/// wait for one fetch and share its result.
pub struct CredentialCache {
    source: Arc<dyn CredentialSource>,
    ttl: Duration,
    slot: Mutex<Option<CachedToken>>,
}

impl CredentialCache {
    pub fn new(source: Arc<dyn CredentialSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> AppResult<SecretString> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(copy(&cached.token));
            }
            debug!("Cloud credential expired");
        }

        // Cleared first so a failed fetch leaves nothing behind.
        *slot = None;
        let token = self.source.fetch_token().await?;
        info!("Fetched new cloud credential");

        *slot = Some(CachedToken {
            token: copy(&token),
            fetched_at: Instant::now(),
        });
        Ok(token)
    }

    /// Drop the cached token; the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

fn copy(token: &SecretString) -> SecretString {
    SecretString::from(token.expose_secret().to_owned())
}
