//! Reconciliation of a user's entitlement with their Stripe subscription.
//!
//! One run fetches the subscription, maps its status to a plan and, when it differs
//! from the plan recorded locally, pushes it to the cloud admin API and records it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::app_error::AppResult;
use crate::application::ports::cloud_admin::EntitlementApi;
use crate::application::ports::notifier::PlanChangeNotifier;
use crate::application::ports::payment_processor::PaymentProcessor;
use crate::application::retry::{RetryPolicy, with_retry};
use crate::application::use_cases::account::AccountUseCases;
use crate::domain::entities::plan::Plan;
use crate::domain::entities::reconciliation_run::ReconciliationInput;

// ============================================================================
// Repository Trait
// ============================================================================

#[async_trait]
pub trait PlanRecordRepoTrait: Send + Sync {
    /// Plan last applied to the user's entitlement, if any.
    async fn find_plan(&self, auth_subject_id: &str) -> AppResult<Option<Plan>>;

    /// Record `plan` as applied for the user, replacing any previous record.
    async fn save_plan(
        &self,
        auth_subject_id: &str,
        processor_customer_id: &str,
        plan: Plan,
    ) -> AppResult<()>;
}

// ============================================================================
// Policies & Outcome
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciliationPolicies {
    pub fetch_subscription: RetryPolicy,
    pub record_plan: RetryPolicy,
    pub apply_entitlement: RetryPolicy,
}

impl Default for ReconciliationPolicies {
    fn default() -> Self {
        Self {
            fetch_subscription: RetryPolicy::default(),
            record_plan: RetryPolicy::default(),
            apply_entitlement: RetryPolicy::new(Duration::from_secs(10), 20, 1.2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The plan changed and the entitlement was applied.
    Applied(Plan),
    /// The recorded plan already matched; nothing was sent.
    Unchanged(Plan),
    /// The subscription carries no entitlement decision.
    Ignored { status: String, price_id: String },
}

impl ReconcileOutcome {
    pub fn describe(&self) -> String {
        match self {
            ReconcileOutcome::Applied(plan) => format!("applied:{}", plan),
            ReconcileOutcome::Unchanged(plan) => format!("unchanged:{}", plan),
            ReconcileOutcome::Ignored { status, .. } => format!("ignored:{}", status),
        }
    }
}

// ============================================================================
// Use Cases
// ============================================================================

#[derive(Clone)]
pub struct ReconciliationUseCases {
    accounts: Arc<AccountUseCases>,
    processor: Arc<dyn PaymentProcessor>,
    plans: Arc<dyn PlanRecordRepoTrait>,
    entitlements: Arc<dyn EntitlementApi>,
    notifier: Option<Arc<dyn PlanChangeNotifier>>,
    pro_price_id: String,
    policies: ReconciliationPolicies,
}

impl ReconciliationUseCases {
    pub fn new(
        accounts: Arc<AccountUseCases>,
        processor: Arc<dyn PaymentProcessor>,
        plans: Arc<dyn PlanRecordRepoTrait>,
        entitlements: Arc<dyn EntitlementApi>,
        notifier: Option<Arc<dyn PlanChangeNotifier>>,
        pro_price_id: String,
        policies: ReconciliationPolicies,
    ) -> Self {
        Self {
            accounts,
            processor,
            plans,
            entitlements,
            notifier,
            pro_price_id,
            policies,
        }
    }

    pub async fn run(&self, input: &ReconciliationInput) -> AppResult<ReconcileOutcome> {
        let snapshot = with_retry(&self.policies.fetch_subscription, "fetch_subscription", || {
            self.processor.get_subscription(&input.subscription_id)
        })
        .await?;
        info!(
            subscription_id = %snapshot.subscription_id,
            customer_id = %input.customer_id,
            status = %snapshot.status,
            "Fetched subscription"
        );

        // Fatal when missing: the run fails without retries.
        let auth_subject_id = self.accounts.find_auth_subject(&input.customer_id).await?;

        let Some(plan) = snapshot.target_plan(&self.pro_price_id) else {
            warn!(
                subscription_id = %snapshot.subscription_id,
                status = %snapshot.status,
                price_id = %snapshot.price_id,
                auth_subject_id = %auth_subject_id,
                "No entitlement change for subscription"
            );
            return Ok(ReconcileOutcome::Ignored {
                status: snapshot.status.to_string(),
                price_id: snapshot.price_id,
            });
        };

        let recorded = with_retry(&self.policies.record_plan, "find_plan", || {
            self.plans.find_plan(&auth_subject_id)
        })
        .await?;

        if recorded == Some(plan) {
            info!(auth_subject_id = %auth_subject_id, plan = %plan, "User already has plan");
            return Ok(ReconcileOutcome::Unchanged(plan));
        }

        // The record is written only after the entitlement call succeeds, so a failed
        // or interrupted run is applied again by the next run for this user.
        let status = with_retry(&self.policies.apply_entitlement, "apply_entitlement", || {
            self.entitlements.update_plan(&auth_subject_id, plan)
        })
        .await?;
        info!(
            auth_subject_id = %auth_subject_id,
            plan = %plan,
            response_status = status,
            "Updated cloud entitlement"
        );

        with_retry(&self.policies.record_plan, "record_plan", || {
            self.plans
                .save_plan(&auth_subject_id, &input.customer_id, plan)
        })
        .await?;

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.plan_changed(&auth_subject_id, plan, status).await {
                warn!(error = %e, auth_subject_id = %auth_subject_id, "Plan change notification failed");
            }
        }

        Ok(ReconcileOutcome::Applied(plan))
    }
}
