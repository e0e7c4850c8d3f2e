use crate::domain::entities::plan::Plan;

/// Subscription status as reported by Stripe.
///
/// Statuses this service does not act on are kept verbatim in `Other` so they can
/// still be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    Canceled,
    Unpaid,
    Paused,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Other(String),
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Other(raw) => raw,
        }
    }

    /// Plan a user should hold while their subscription is in this status.
    ///
    /// `None` means the status carries no entitlement decision and must be ignored.
    pub fn target_plan(&self) -> Option<Plan> {
        match self {
            SubscriptionStatus::Active | SubscriptionStatus::Trialing => Some(Plan::Pro),
            SubscriptionStatus::Canceled
            | SubscriptionStatus::Unpaid
            | SubscriptionStatus::Paused => Some(Plan::Free),
            _ => None,
        }
    }
}

impl From<&str> for SubscriptionStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            "paused" => SubscriptionStatus::Paused,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "past_due" => SubscriptionStatus::PastDue,
            other => SubscriptionStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a subscription, fetched fresh on every reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub subscription_id: String,
    pub customer_id: String,
    pub price_id: String,
    pub status: SubscriptionStatus,
}

impl SubscriptionSnapshot {
    /// Plan for this snapshot, or `None` when it is not a subscription to the pro price
    /// or its status carries no decision.
    pub fn target_plan(&self, pro_price_id: &str) -> Option<Plan> {
        if self.price_id != pro_price_id {
            return None;
        }
        self.status.target_plan()
    }
}
