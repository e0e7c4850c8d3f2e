//! Test app state builder for HTTP-level integration testing.
//!
//! This module provides `TestAppStateBuilder` which creates a minimal `AppState`
//! with in-memory mocks for testing HTTP endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::AccessTokenVerifier,
        retry::RetryPolicy,
        use_cases::{
            account::AccountUseCases,
            billing_session::BillingSessionUseCases,
            reconciliation::{ReconciliationPolicies, ReconciliationUseCases},
            reconciliation_runner::ReconciliationRunner,
            webhook::WebhookUseCases,
        },
    },
    domain::entities::{account::Account, subscription::SubscriptionSnapshot},
    infra::config::AppConfig,
    test_utils::{
        InMemoryAccountRepo, InMemoryPlanRecordRepo, InMemoryRunRepo, MockPaymentProcessor,
        RecordingEntitlementApi, StaticTokenVerifier, test_redirect_defaults,
    },
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_PRO_PRICE: &str = "price_pro";

fn no_retry_policies() -> ReconciliationPolicies {
    ReconciliationPolicies {
        fetch_subscription: RetryPolicy::no_retry(),
        record_plan: RetryPolicy::no_retry(),
        apply_entitlement: RetryPolicy::no_retry(),
    }
}

/// In-memory collaborators behind a test `AppState`, kept for assertions.
pub struct TestMocks {
    pub accounts: Arc<InMemoryAccountRepo>,
    pub plans: Arc<InMemoryPlanRecordRepo>,
    pub runs: Arc<InMemoryRunRepo>,
    pub processor: Arc<MockPaymentProcessor>,
    pub entitlements: Arc<RecordingEntitlementApi>,
}

/// Runner over empty in-memory stores, without retries.
pub fn create_test_runner() -> (Arc<ReconciliationRunner>, Arc<RecordingEntitlementApi>) {
    let entitlements = Arc::new(RecordingEntitlementApi::new());
    let job = ReconciliationUseCases::new(
        Arc::new(AccountUseCases::new(Arc::new(InMemoryAccountRepo::new()))),
        Arc::new(MockPaymentProcessor::new()),
        Arc::new(InMemoryPlanRecordRepo::new()),
        entitlements.clone(),
        None,
        TEST_PRO_PRICE.to_string(),
        no_retry_policies(),
    );
    let runner = ReconciliationRunner::new(Arc::new(InMemoryRunRepo::new()), Arc::new(job));
    (Arc::new(runner), entitlements)
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let (app_state, mocks) = TestAppStateBuilder::new()
///     .with_user("token-1", "auth0|1", Some("one@example.com"))
///     .with_account(create_test_account(|a| a.auth_subject_id = "auth0|1".into()))
///     .build_with_mocks();
/// ```
pub struct TestAppStateBuilder {
    accounts: Vec<Account>,
    subscriptions: Vec<SubscriptionSnapshot>,
    verifier: StaticTokenVerifier,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            accounts: vec![],
            subscriptions: vec![],
            verifier: StaticTokenVerifier::new(),
        }
    }

    /// Add a stored account.
    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// Make `token` a valid bearer token for `subject`.
    pub fn with_user(mut self, token: &str, subject: &str, email: Option<&str>) -> Self {
        self.verifier = self.verifier.with_user(token, subject, email);
        self
    }

    /// Make a subscription available from the mock processor.
    pub fn with_subscription(mut self, snapshot: SubscriptionSnapshot) -> Self {
        self.subscriptions.push(snapshot);
        self
    }

    pub fn build(self) -> AppState {
        self.build_with_mocks().0
    }

    /// Build the AppState and return the in-memory collaborators for assertions.
    pub fn build_with_mocks(self) -> (AppState, TestMocks) {
        let account_repo = Arc::new(InMemoryAccountRepo::with_accounts(self.accounts));
        let plan_repo = Arc::new(InMemoryPlanRecordRepo::new());
        let run_repo = Arc::new(InMemoryRunRepo::new());
        let processor = Arc::new(MockPaymentProcessor::new());
        for snapshot in self.subscriptions {
            processor.put_subscription(snapshot);
        }
        let entitlements = Arc::new(RecordingEntitlementApi::new());

        let accounts = Arc::new(AccountUseCases::new(account_repo.clone()));

        let billing_use_cases = Arc::new(BillingSessionUseCases::new(
            accounts.clone(),
            processor.clone(),
            TEST_PRO_PRICE.to_string(),
            test_redirect_defaults(),
            RetryPolicy::no_retry(),
        ));

        let job = Arc::new(ReconciliationUseCases::new(
            accounts,
            processor.clone(),
            plan_repo.clone(),
            entitlements.clone(),
            None,
            TEST_PRO_PRICE.to_string(),
            no_retry_policies(),
        ));
        let runner = Arc::new(ReconciliationRunner::new(run_repo.clone(), job));
        let webhook_use_cases = Arc::new(WebhookUseCases::new(runner));

        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            database_url: String::new(),
            cors_origins: vec![HeaderValue::from_static("http://localhost:3000")],
            stripe_secret_key: SecretString::from("sk_test_123".to_string()),
            stripe_webhook_secret: SecretString::from(TEST_WEBHOOK_SECRET.to_string()),
            stripe_pro_price: TEST_PRO_PRICE.to_string(),
            default_success_url: Url::parse("https://console.example.com/").unwrap(),
            default_cancel_url: Url::parse("https://example.com/pricing").unwrap(),
            default_return_url: Url::parse("https://example.com/account").unwrap(),
            cloud_domain: "cloud.test".to_string(),
            auth_domain: "login.test".to_string(),
            auth_audience: "cloud-api".to_string(),
            auth_email_claim: "email".to_string(),
            oauth_client_id: "client_test".to_string(),
            oauth_refresh_token: SecretString::from("refresh_test".to_string()),
            credential_ttl: Duration::from_secs(43_200),
            slack: None,
            notify_skip_user: None,
            run_recovery_interval: Duration::from_secs(300),
        });

        let token_verifier: Arc<dyn AccessTokenVerifier> = Arc::new(self.verifier);

        let app_state = AppState {
            config,
            billing_use_cases,
            webhook_use_cases,
            token_verifier,
        };

        let mocks = TestMocks {
            accounts: account_repo,
            plans: plan_repo,
            runs: run_repo,
            processor,
            entitlements,
        };

        (app_state, mocks)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
