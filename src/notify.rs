//! Lead notification — best-effort webhook push for `Interested` emails.
//!
//! Fire-and-forget: the orchestrator spawns `notify_interested` on a
//! detached task and never awaits it. An unconfigured webhook is a logged
//! no-op; delivery failures are logged and swallowed so ingestion can never
//! block or fail on notification problems.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::NotifyError;
use crate::model::EmailRecord;

/// Webhook delivery timeout. One attempt, no retry.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Receiver of interested-lead events.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Push one lead event. Must not fail from the caller's perspective.
    async fn notify_interested(&self, email: &EmailRecord);
}

/// Slack incoming-webhook notifier.
pub struct SlackNotifier {
    webhook_url: Option<String>,
    http: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self { webhook_url, http })
    }

    async fn try_post(&self, url: &str, email: &EmailRecord) -> Result<(), NotifyError> {
        let response = self.http.post(url).json(&lead_payload(email)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_interested(&self, email: &EmailRecord) {
        let Some(url) = self.webhook_url.as_deref() else {
            debug!("Slack webhook not configured; skipping lead notification");
            return;
        };

        match self.try_post(url, email).await {
            Ok(()) => {
                info!(subject = %email.subject, "Slack notification sent for lead");
            }
            Err(e) => {
                warn!(error = %e, subject = %email.subject, "Slack notification failed");
            }
        }
    }
}

/// Block-kit payload: a summary line plus From/Subject/Account/Date fields.
pub fn lead_payload(email: &EmailRecord) -> serde_json::Value {
    json!({
        "text": "New Interested Email!",
        "blocks": [
            {
                "type": "header",
                "text": { "type": "plain_text", "text": "New Interested Lead" }
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*From:*\n{}", email.sender) },
                    { "type": "mrkdwn", "text": format!("*Subject:*\n{}", email.subject) },
                    { "type": "mrkdwn", "text": format!("*Account:*\n{}", email.account) },
                    { "type": "mrkdwn", "text": format!("*Date:*\n{}", email.date.to_rfc3339()) },
                ]
            }
        ]
    })
}

// ── Tests ───────────────────────────────────────────────────────────
