//! Fakes for external services: Stripe, the cloud admin API, the credential
//! source, the chat notifier and the access-token verifier.

use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        jwt::{AccessTokenVerifier, AuthenticatedUser},
        ports::{
            cloud_admin::{CredentialSource, EntitlementApi},
            notifier::PlanChangeNotifier,
            payment_processor::{CheckoutRequest, PaymentProcessor},
        },
    },
    domain::entities::{plan::Plan, subscription::SubscriptionSnapshot},
};

// ============================================================================
// MockPaymentProcessor
// ============================================================================

/// In-memory Stripe. Customer creation is idempotent per auth subject, like the
/// real client with its idempotency key.
#[derive(Default)]
pub struct MockPaymentProcessor {
    customers: Mutex<HashMap<String, String>>,
    subscriptions: Mutex<HashMap<String, SubscriptionSnapshot>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
    subscription_fetches: AtomicUsize,
    checkout_attempts: AtomicUsize,
    checkout_failures_left: AtomicUsize,
    no_checkout_url: bool,
    decline: Option<String>,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checkout sessions come back without a URL.
    pub fn without_checkout_url(mut self) -> Self {
        self.no_checkout_url = true;
        self
    }

    /// The first `n` checkout session calls fail with a transient upstream error.
    pub fn failing_checkouts(self, n: usize) -> Self {
        self.checkout_failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Customer creation is declined with `message`.
    pub fn declining(mut self, message: &str) -> Self {
        self.decline = Some(message.to_string());
        self
    }

    pub fn put_subscription(&self, snapshot: SubscriptionSnapshot) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(snapshot.subscription_id.clone(), snapshot);
    }

    pub fn customer_count(&self) -> usize {
        self.customers.lock().unwrap().len()
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().unwrap().clone()
    }

    pub fn last_checkout(&self) -> Option<CheckoutRequest> {
        self.checkouts.lock().unwrap().last().cloned()
    }

    pub fn subscription_fetches(&self) -> usize {
        self.subscription_fetches.load(Ordering::SeqCst)
    }

    /// Checkout session calls, failed ones included.
    pub fn checkout_attempts(&self) -> usize {
        self.checkout_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn create_customer(&self, auth_subject_id: &str, _email: &str) -> AppResult<String> {
        // Let concurrent callers interleave between lookup and creation.
        tokio::task::yield_now().await;

        if let Some(message) = &self.decline {
            return Err(AppError::ProcessorDeclined(message.clone()));
        }

        let mut customers = self.customers.lock().unwrap();
        let next = format!("cus_test{}", customers.len() + 1);
        Ok(customers
            .entry(auth_subject_id.to_string())
            .or_insert(next)
            .clone())
    }

    async fn get_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionSnapshot> {
        self.subscription_fetches.fetch_add(1, Ordering::SeqCst);
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| {
                AppError::ProcessorDeclined(format!("No such subscription: '{}'", subscription_id))
            })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> AppResult<Option<String>> {
        self.checkout_attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .checkout_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Upstream("Stripe returned 503".into()));
        }

        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        if self.no_checkout_url {
            return Ok(None);
        }
        Ok(Some(format!("https://checkout.test/cs_test{}", checkouts.len())))
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> AppResult<String> {
        Ok(format!("https://portal.test/{}?return={}", customer_id, return_url))
    }
}

// ============================================================================
// RecordingEntitlementApi
// ============================================================================

#[derive(Default)]
pub struct RecordingEntitlementApi {
    calls: Mutex<Vec<(String, Plan)>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
}

impl RecordingEntitlementApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` calls fail with a transient upstream error.
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// Successful calls.
    pub fn calls(&self) -> Vec<(String, Plan)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementApi for RecordingEntitlementApi {
    async fn update_plan(&self, auth_subject_id: &str, plan: Plan) -> AppResult<u16> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Upstream("Entitlement API returned 503".into()));
        }

        self.calls
            .lock()
            .unwrap()
            .push((auth_subject_id.to_string(), plan));
        Ok(200)
    }
}

// ============================================================================
// RecordingNotifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<(String, Plan)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<(String, Plan)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanChangeNotifier for RecordingNotifier {
    async fn plan_changed(
        &self,
        auth_subject_id: &str,
        plan: Plan,
        _entitlement_status: u16,
    ) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("chat.postMessage failed".into()));
        }
        self.notifications
            .lock()
            .unwrap()
            .push((auth_subject_id.to_string(), plan));
        Ok(())
    }
}

// ============================================================================
// CountingCredentialSource
// ============================================================================

/// Issues `token-1`, `token-2`, ... and counts fetches.
#[derive(Default)]
pub struct CountingCredentialSource {
    fetches: AtomicUsize,
    failing: AtomicBool,
}

impl CountingCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialSource for CountingCredentialSource {
    async fn fetch_token(&self) -> AppResult<SecretString> {
        // Give concurrent callers a chance to pile up behind the refresh.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("Token endpoint returned 500".into()));
        }
        Ok(SecretString::from(format!("token-{}", n)))
    }
}

// ============================================================================
// StaticTokenVerifier
// ============================================================================

/// Accepts a fixed set of bearer tokens.
#[derive(Default)]
pub struct StaticTokenVerifier {
    users: HashMap<String, AuthenticatedUser>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, subject: &str, email: Option<&str>) -> Self {
        self.users.insert(
            token.to_string(),
            AuthenticatedUser {
                subject: subject.to_string(),
                email: email.map(str::to_string),
            },
        );
        self
    }
}

#[async_trait]
impl AccessTokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<AuthenticatedUser> {
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::NotAuthenticated("Invalid access token".into()))
    }
}
