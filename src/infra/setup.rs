use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        jwt::AccessTokenVerifier,
        ports::notifier::PlanChangeNotifier,
        use_cases::{
            account::{AccountRepoTrait, AccountUseCases},
            billing_session::{BillingSessionUseCases, RedirectDefaults, SESSION_CALLS_RETRY},
            reconciliation::{PlanRecordRepoTrait, ReconciliationPolicies, ReconciliationUseCases},
            reconciliation_runner::{ReconciliationRunRepoTrait, ReconciliationRunner},
            webhook::WebhookUseCases,
        },
    },
    infra::{
        cloud_admin_client::CloudAdminClient, config::AppConfig,
        credential_cache::CredentialCache, error::InfraError, http_client::build_client,
        jwks::JwksVerifier, oauth_refresh::OAuthRefreshSource, postgres_persistence,
        slack_notifier::SlackNotifier, stripe_client::StripeClient,
    },
};

/// Application state plus the runner driving background reconciliation.
pub struct Services {
    pub app_state: AppState,
    pub runner: Arc<ReconciliationRunner>,
}

pub async fn init_app_state() -> anyhow::Result<Services> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let http = build_client().map_err(InfraError::HttpClient)?;

    let accounts = Arc::new(AccountUseCases::new(
        postgres_arc.clone() as Arc<dyn AccountRepoTrait>
    ));

    let stripe = Arc::new(StripeClient::new(
        http.clone(),
        SecretString::from(config.stripe_secret_key.expose_secret().to_owned()),
    ));

    let credentials = Arc::new(CredentialCache::new(
        Arc::new(OAuthRefreshSource::new(
            http.clone(),
            &config.auth_domain,
            config.oauth_client_id.clone(),
            SecretString::from(config.oauth_refresh_token.expose_secret().to_owned()),
        )),
        config.credential_ttl,
    ));
    let entitlements = Arc::new(CloudAdminClient::new(
        http.clone(),
        &config.cloud_domain,
        credentials,
    ));

    let notifier: Option<Arc<dyn PlanChangeNotifier>> = match &config.slack {
        Some(slack) => Some(Arc::new(SlackNotifier::new(
            http.clone(),
            SecretString::from(slack.token.expose_secret().to_owned()),
            slack.channel.clone(),
            config.notify_skip_user.clone(),
        ))),
        None => {
            info!("SLACK_TOKEN not set, plan change notifications disabled");
            None
        }
    };

    let billing_use_cases = BillingSessionUseCases::new(
        accounts.clone(),
        stripe.clone(),
        config.stripe_pro_price.clone(),
        RedirectDefaults {
            success_url: config.default_success_url.to_string(),
            cancel_url: config.default_cancel_url.to_string(),
            return_url: config.default_return_url.to_string(),
        },
        SESSION_CALLS_RETRY,
    );

    let reconciliation = ReconciliationUseCases::new(
        accounts,
        stripe,
        postgres_arc.clone() as Arc<dyn PlanRecordRepoTrait>,
        entitlements,
        notifier,
        config.stripe_pro_price.clone(),
        ReconciliationPolicies::default(),
    );
    let runner = Arc::new(ReconciliationRunner::new(
        postgres_arc as Arc<dyn ReconciliationRunRepoTrait>,
        Arc::new(reconciliation),
    ));

    let token_verifier: Arc<dyn AccessTokenVerifier> = Arc::new(JwksVerifier::new(
        http,
        &config.auth_domain,
        &config.auth_audience,
        config.auth_email_claim.clone(),
    ));

    let app_state = AppState {
        config: Arc::new(config),
        billing_use_cases: Arc::new(billing_use_cases),
        webhook_use_cases: Arc::new(WebhookUseCases::new(runner.clone())),
        token_verifier,
    };

    Ok(Services { app_state, runner })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cloud_subscription=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        // Structured logs for log shippers
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
            .ok();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false) // don't show target (module path)
                    .with_level(true)
                    .pretty(),
            )
            .try_init()
            .ok();
    }
}
