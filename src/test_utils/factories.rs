//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::NaiveDateTime;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;

use crate::{
    application::use_cases::{billing_session::RedirectDefaults, webhook::WebhookEvent},
    domain::entities::{
        account::Account,
        subscription::{SubscriptionSnapshot, SubscriptionStatus},
    },
};

/// Create a test account with sensible defaults.
pub fn create_test_account(overrides: impl FnOnce(&mut Account)) -> Account {
    let mut account = Account {
        auth_subject_id: "auth0|test-user".to_string(),
        email: "user@example.com".to_string(),
        processor_customer_id: "cus_test".to_string(),
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut account);
    account
}

/// Create an active pro subscription snapshot.
pub fn create_test_snapshot(
    overrides: impl FnOnce(&mut SubscriptionSnapshot),
) -> SubscriptionSnapshot {
    let mut snapshot = SubscriptionSnapshot {
        subscription_id: "sub_test".to_string(),
        customer_id: "cus_test".to_string(),
        price_id: "price_pro".to_string(),
        status: SubscriptionStatus::Active,
    };
    overrides(&mut snapshot);
    snapshot
}

/// Create a webhook event wrapping `object`.
pub fn create_test_event(id: &str, event_type: &str, object: Value) -> WebhookEvent {
    serde_json::from_value(test_event_json(id, event_type, object)).unwrap()
}

/// Raw Stripe event payload as delivered to the webhook endpoint.
pub fn test_event_json(id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "api_version": "2024-06-20",
        "created": 1_700_000_000,
        "livemode": false,
        "data": { "object": object },
    })
}

pub fn test_redirect_defaults() -> RedirectDefaults {
    RedirectDefaults {
        success_url: "https://console.example.com/".to_string(),
        cancel_url: "https://example.com/pricing".to_string(),
        return_url: "https://example.com/account".to_string(),
    }
}

/// Create a fixed test datetime for reproducible tests.
pub fn test_datetime() -> NaiveDateTime {
    chrono::DateTime::from_timestamp(1_700_000_000, 0)
        .unwrap()
        .naive_utc()
}

/// `Stripe-Signature` header for `payload` signed with `secret` at `timestamp`.
pub fn stripe_signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}
