use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::payment_processor::{CheckoutRequest, PaymentProcessor};
use crate::domain::entities::subscription::{SubscriptionSnapshot, SubscriptionStatus};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Signed webhooks older (or newer) than this are rejected.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
}

impl StripeClient {
    pub fn new(client: Client, secret_key: SecretString) -> Self {
        Self { client, secret_key }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        idempotency_key: Option<&str>,
    ) -> AppResult<T> {
        let mut request = self
            .client
            .post(format!("{}{}", STRIPE_API_BASE, path))
            .header("Authorization", self.auth_header())
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(request_failed)?;
        handle_response(response).await
    }

    // ========================================================================
    // Webhook Signature Verification
    // ========================================================================

    pub fn verify_webhook_signature(
        payload: &[u8],
        signature_header: &str,
        webhook_secret: &str,
    ) -> AppResult<()> {
        Self::verify_webhook_signature_at(
            payload,
            signature_header,
            webhook_secret,
            chrono::Utc::now().timestamp(),
        )
    }

    /// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`) at `now`.
    pub fn verify_webhook_signature_at(
        payload: &[u8],
        signature_header: &str,
        webhook_secret: &str,
        now: i64,
    ) -> AppResult<()> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| AppError::InvalidSignature("Missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(AppError::InvalidSignature("Missing v1 signature".into()));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AppError::InvalidSignature("Invalid timestamp".into()))?;
        if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
            return Err(AppError::InvalidSignature(
                "Timestamp outside the tolerance zone".into(),
            ));
        }

        let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("HMAC error".into()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.into_iter().any(|sig| {
            hex::decode(sig)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(AppError::InvalidSignature(
                "No signatures found matching the expected signature".into(),
            ))
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_customer(&self, auth_subject_id: &str, email: &str) -> AppResult<String> {
        // Same key for the same subject: retries and concurrent first checkouts get one customer.
        let idempotency_key = format!("create-customer-{}", auth_subject_id);
        let customer: StripeCustomer = self
            .post_form(
                "/customers",
                &[
                    ("email", email),
                    ("metadata[auth_subject_id]", auth_subject_id),
                ],
                Some(&idempotency_key),
            )
            .await?;
        Ok(customer.id)
    }

    async fn get_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionSnapshot> {
        let response = self
            .client
            .get(format!("{}/subscriptions/{}", STRIPE_API_BASE, subscription_id))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(request_failed)?;

        let subscription: StripeSubscription = handle_response(response).await?;
        Ok(subscription.into_snapshot())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> AppResult<Option<String>> {
        let session: StripeCheckoutSession = self
            .post_form(
                "/checkout/sessions",
                &[
                    ("customer", request.customer_id.as_str()),
                    ("mode", "subscription"),
                    ("billing_address_collection", "auto"),
                    ("allow_promotion_codes", "true"),
                    ("line_items[0][price]", request.price_id.as_str()),
                    ("line_items[0][quantity]", "1"),
                    ("success_url", request.success_url.as_str()),
                    ("cancel_url", request.cancel_url.as_str()),
                ],
                None,
            )
            .await?;
        Ok(session.url)
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> AppResult<String> {
        let session: StripePortalSession = self
            .post_form(
                "/billing_portal/sessions",
                &[("customer", customer_id), ("return_url", return_url)],
                None,
            )
            .await?;
        Ok(session.url)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn request_failed(e: reqwest::Error) -> AppError {
    AppError::Upstream(format!("Stripe request failed: {}", e))
}

async fn handle_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to read Stripe response: {}", e)))?;

    if !status.is_success() {
        tracing::error!(status = %status, body = %body, "Stripe API error");
        return Err(error_for_status(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
        AppError::Upstream(format!("Failed to parse Stripe response: {}", e))
    })
}

/// Client errors are declines and final; rate limiting and server errors are transient.
fn error_for_status(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<StripeErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message.or(Some(e.error.error_type)))
        .unwrap_or_else(|| format!("Stripe API error: {}", status));

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        AppError::ProcessorDeclined(message)
    } else {
        AppError::Upstream(message)
    }
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripePortalSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub items: StripeSubscriptionItems,
}

impl StripeSubscription {
    /// Price of the first subscription item.
    pub fn price_id(&self) -> String {
        self.items
            .data
            .first()
            .map(|item| item.price.id.clone())
            .unwrap_or_default()
    }

    pub fn into_snapshot(self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            price_id: self.price_id(),
            status: SubscriptionStatus::from(self.status.as_str()),
            subscription_id: self.id,
            customer_id: self.customer,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub price: StripePrice,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
}
