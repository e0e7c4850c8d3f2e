use std::sync::Arc;

use crate::{
    application::{
        jwt::AccessTokenVerifier,
        use_cases::{billing_session::BillingSessionUseCases, webhook::WebhookUseCases},
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub billing_use_cases: Arc<BillingSessionUseCases>,
    pub webhook_use_cases: Arc<WebhookUseCases>,
    pub token_verifier: Arc<dyn AccessTokenVerifier>,
}
