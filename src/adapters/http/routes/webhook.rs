//! Stripe webhook receiver.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::info;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::webhook::{WebhookEvent, WebhookOutcome},
    infra::stripe_client::StripeClient,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/stripe_webhook", post(handle_webhook))
}

/// POST /stripe_webhook
///
/// Answers once the reconciliation run is persisted; the run itself continues in
/// the background. A 500 means the run was not stored and Stripe should redeliver.
async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::InvalidSignature("Missing Stripe signature".into()))?;

    StripeClient::verify_webhook_signature(
        &body,
        signature,
        app_state.config.stripe_webhook_secret.expose_secret(),
    )?;

    let event = WebhookEvent::parse(&body)?;

    match app_state.webhook_use_cases.handle_event(&event).await? {
        WebhookOutcome::Scheduled(_) => {
            info!(event_id = %event.id, event_type = %event.event_type, "Reconciliation scheduled")
        }
        WebhookOutcome::Duplicate => {
            info!(event_id = %event.id, "Event already handled, skipping")
        }
        WebhookOutcome::Ignored => {}
    }

    Ok(Json(json!({ "received": true })))
}
