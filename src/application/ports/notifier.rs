use async_trait::async_trait;

use crate::app_error::AppResult;
use crate::domain::entities::plan::Plan;

/// Chat notification sent after a user's plan changed.
#[async_trait]
pub trait PlanChangeNotifier: Send + Sync {
    async fn plan_changed(
        &self,
        auth_subject_id: &str,
        plan: Plan,
        entitlement_status: u16,
    ) -> AppResult<()>;
}
