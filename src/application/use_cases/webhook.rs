//! Stripe webhook events and the reconciliation jobs they trigger.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::reconciliation_runner::{ReconciliationRunner, Scheduled};
use crate::domain::entities::reconciliation_run::ReconciliationInput;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))
    }

    /// Reconciliation job for this event, or `None` when the event type is not relevant.
    pub fn reconciliation_input(&self) -> Option<ReconciliationInput> {
        let object = &self.data.object;
        match self.event_type.as_str() {
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted" => Some(ReconciliationInput {
                subscription_id: object["id"].as_str()?.to_string(),
                customer_id: id_of(&object["customer"])?,
            }),
            "checkout.session.completed" if object["mode"].as_str() == Some("subscription") => {
                Some(ReconciliationInput {
                    subscription_id: id_of(&object["subscription"])?,
                    customer_id: id_of(&object["customer"])?,
                })
            }
            _ => None,
        }
    }
}

/// Stripe sends references either as an id string or as the expanded object.
fn id_of(value: &Value) -> Option<String> {
    value
        .as_str()
        .or_else(|| value["id"].as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[derive(Debug)]
pub enum WebhookOutcome {
    Scheduled(JoinHandle<()>),
    Duplicate,
    Ignored,
}

#[derive(Clone)]
pub struct WebhookUseCases {
    runner: Arc<ReconciliationRunner>,
}

impl WebhookUseCases {
    pub fn new(runner: Arc<ReconciliationRunner>) -> Self {
        Self { runner }
    }

    /// Schedule the reconciliation job for a verified event without waiting for it.
    pub async fn handle_event(&self, event: &WebhookEvent) -> AppResult<WebhookOutcome> {
        let Some(input) = event.reconciliation_input() else {
            info!(event_id = %event.id, event_type = %event.event_type, "Unhandled event type");
            return Ok(WebhookOutcome::Ignored);
        };

        debug!(event_id = %event.id, event_type = %event.event_type, "Handling webhook event");
        match self.runner.start(&event.id, input).await? {
            Scheduled::Started(handle) => Ok(WebhookOutcome::Scheduled(handle)),
            Scheduled::Duplicate => Ok(WebhookOutcome::Duplicate),
        }
    }
}
