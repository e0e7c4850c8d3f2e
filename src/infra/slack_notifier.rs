//! Plan-change announcements via Slack `chat.postMessage`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::app_error::{AppError, AppResult};
use crate::application::ports::notifier::PlanChangeNotifier;
use crate::domain::entities::plan::Plan;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

pub struct SlackNotifier {
    client: Client,
    token: SecretString,
    channel: String,
    skip_user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(
        client: Client,
        token: SecretString,
        channel: String,
        skip_user: Option<String>,
    ) -> Self {
        Self {
            client,
            token,
            channel,
            skip_user,
        }
    }
}

fn message(channel: &str, auth_subject_id: &str, plan: Plan, entitlement_status: u16) -> Value {
    let title = match plan {
        Plan::Pro => "User subscribed to Pro :partying_face:",
        Plan::Free => "User canceled Pro :sadge:",
    };

    json!({
        "channel": channel,
        "text": title,
        "attachments": [{
            "text": format!(
                "User {} is using {} tier. Cloud response status: {}",
                auth_subject_id, plan, entitlement_status
            ),
        }],
    })
}

#[async_trait]
impl PlanChangeNotifier for SlackNotifier {
    async fn plan_changed(
        &self,
        auth_subject_id: &str,
        plan: Plan,
        entitlement_status: u16,
    ) -> AppResult<()> {
        if self.skip_user.as_deref() == Some(auth_subject_id) {
            debug!(auth_subject_id, "Skipping notification for excluded user");
            return Ok(());
        }

        let response = self
            .client
            .post(POST_MESSAGE_URL)
            .bearer_auth(self.token.expose_secret())
            .json(&message(&self.channel, auth_subject_id, plan, entitlement_status))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Slack request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .json::<SlackResponse>()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Slack response: {}", e)))?;

        // Slack reports most failures with 200 and `ok: false`.
        if !status.is_success() || !body.ok {
            error!(status = %status, error = ?body.error, "Failed to send Slack notification");
            return Err(AppError::Upstream(format!(
                "Slack returned {}: {}",
                status,
                body.error.unwrap_or_default()
            )));
        }

        info!(auth_subject_id, plan = %plan, "Sent plan change notification");
        Ok(())
    }
}
