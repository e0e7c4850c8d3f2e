//! Checkout and billing-portal sessions for the authenticated user.

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt::AuthenticatedUser,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/create-customer-portal", post(create_customer_portal))
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeRequest {
    success_url: Option<String>,
    cancel_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PortalRequest {
    return_url: Option<String>,
}

#[derive(Serialize)]
struct SessionUrlResponse {
    url: String,
}

/// Both bodies are optional: an empty body means "use the defaults".
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e)))
}

/// POST /subscribe
async fn subscribe(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> AppResult<Json<SessionUrlResponse>> {
    let request: SubscribeRequest = optional_body(&body)?;

    let email = user
        .email
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput("No email found for the authenticated user".into()))?;

    let url = app_state
        .billing_use_cases
        .create_checkout(&user.subject, email, request.success_url, request.cancel_url)
        .await?;

    Ok(Json(SessionUrlResponse { url }))
}

/// POST /create-customer-portal
async fn create_customer_portal(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> AppResult<Json<SessionUrlResponse>> {
    let request: PortalRequest = optional_body(&body)?;

    let url = app_state
        .billing_use_cases
        .create_portal(&user.subject, request.return_url)
        .await?;

    Ok(Json(SessionUrlResponse { url }))
}
