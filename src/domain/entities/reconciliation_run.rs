use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Completed,
    Failed,
}

/// Arguments of one reconciliation job, persisted with the run so it can be resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationInput {
    pub subscription_id: String,
    pub customer_id: String,
}

/// One reconciliation job, keyed by the Stripe event id that triggered it.
#[derive(Debug, Clone)]
pub struct ReconciliationRun {
    pub event_id: String,
    pub input: ReconciliationInput,
    pub status: RunStatus,
    pub attempts: i32,
    pub outcome: Option<String>,
    pub last_error: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
