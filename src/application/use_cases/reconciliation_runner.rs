//! Durable execution of reconciliation jobs.
//!
//! Every job is persisted as a run row keyed by the Stripe event id before it is
//! spawned. The row is the idempotency token: a redelivered event finds the row and
//! nothing runs twice. Runs left pending by a crashed process are claimed again by
//! [`ReconciliationRunner::recover_stale`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app_error::AppResult;
use crate::application::use_cases::reconciliation::ReconciliationUseCases;
use crate::domain::entities::reconciliation_run::{ReconciliationInput, ReconciliationRun};

/// Pending runs untouched for this long are considered abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

const RECOVERY_BATCH_SIZE: i64 = 50;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait ReconciliationRunRepoTrait: Send + Sync {
    /// Insert a pending run. Returns `false` when a run for `event_id` already exists.
    async fn insert_pending(&self, event_id: &str, input: &ReconciliationInput)
    -> AppResult<bool>;

    async fn mark_completed(&self, event_id: &str, outcome: &str) -> AppResult<()>;

    async fn mark_failed(&self, event_id: &str, error: &str) -> AppResult<()>;

    /// Claim pending runs not updated within `stale_after`.
    ///
    /// Claiming bumps `attempts` and `updated_at` so a concurrent recovery pass does not
    /// pick the same runs.
    async fn claim_stale(
        &self,
        stale_after: Duration,
        limit: i64,
    ) -> AppResult<Vec<ReconciliationRun>>;
}

// ============================================================================
// Runner
// ============================================================================

#[derive(Debug)]
pub enum Scheduled {
    /// The job was persisted and is running in the background.
    Started(JoinHandle<()>),
    /// A run for this event already exists.
    Duplicate,
}

#[derive(Clone)]
pub struct ReconciliationRunner {
    runs: Arc<dyn ReconciliationRunRepoTrait>,
    job: Arc<ReconciliationUseCases>,
    stale_after: Duration,
}

impl ReconciliationRunner {
    pub fn new(runs: Arc<dyn ReconciliationRunRepoTrait>, job: Arc<ReconciliationUseCases>) -> Self {
        Self {
            runs,
            job,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Persist a run for `event_id` and execute it in the background.
    ///
    /// Returns once the run row is stored; an error means nothing was scheduled.
    pub async fn start(&self, event_id: &str, input: ReconciliationInput) -> AppResult<Scheduled> {
        if !self.runs.insert_pending(event_id, &input).await? {
            info!(event_id, "Reconciliation run already exists, skipping");
            return Ok(Scheduled::Duplicate);
        }

        info!(
            event_id,
            subscription_id = %input.subscription_id,
            customer_id = %input.customer_id,
            "Scheduled reconciliation run"
        );
        Ok(Scheduled::Started(self.spawn(event_id.to_string(), input)))
    }

    /// Re-run pending runs abandoned by a previous process.
    pub async fn recover_stale(&self) -> AppResult<Vec<JoinHandle<()>>> {
        let claimed = self
            .runs
            .claim_stale(self.stale_after, RECOVERY_BATCH_SIZE)
            .await?;

        Ok(claimed
            .into_iter()
            .map(|run| {
                warn!(
                    event_id = %run.event_id,
                    attempts = run.attempts,
                    "Resuming stale reconciliation run"
                );
                self.spawn(run.event_id, run.input)
            })
            .collect())
    }

    fn spawn(&self, event_id: String, input: ReconciliationInput) -> JoinHandle<()> {
        let runs = Arc::clone(&self.runs);
        let job = Arc::clone(&self.job);

        tokio::spawn(async move {
            execute(runs.as_ref(), &job, &event_id, &input).await;
        })
    }
}

async fn execute(
    runs: &dyn ReconciliationRunRepoTrait,
    job: &ReconciliationUseCases,
    event_id: &str,
    input: &ReconciliationInput,
) {
    let recorded = match job.run(input).await {
        Ok(outcome) => {
            let outcome = outcome.describe();
            info!(event_id, outcome = %outcome, "Reconciliation run completed");
            runs.mark_completed(event_id, &outcome).await
        }
        Err(e) => {
            error!(event_id, error = %e, "Reconciliation run failed");
            runs.mark_failed(event_id, &e.to_string()).await
        }
    };

    // The run stays pending and is picked up by recovery.
    if let Err(e) = recorded {
        error!(event_id, error = %e, "Failed to record reconciliation result");
    }
}
