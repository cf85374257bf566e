//! Sync orchestrator — one full mailbox pass per registered account.
//!
//! A pass walks connect → login → select INBOX → list the trailing window →
//! per-message fetch/decode/classify/dedup/persist/notify. Connection and
//! auth failures abort the pass with nothing persisted; a bad message is
//! logged and skipped; the session is logged out on every exit path that
//! still owns it (otherwise the dropped TCP stream closes it).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::{debug, error, info};

use crate::config::{DEFAULT_LOOKBACK_DAYS, DEFAULT_MESSAGE_CAP};
use crate::decode::decode_message;
use crate::error::SyncError;
use crate::llm::EmailClassifier;
use crate::model::{Category, EmailRecord};
use crate::notify::Notifier;
use crate::store::EmailStore;
use crate::sync::mailbox::{AccountCredentials, MailConnector, Mailbox};

const INBOX_FOLDER: &str = "INBOX";

/// Tunables for a sync pass.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Trailing listing window, in days.
    pub lookback_days: u32,
    /// Maximum messages processed per pass.
    pub message_cap: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            message_cap: DEFAULT_MESSAGE_CAP,
        }
    }
}

/// Counters for one completed (or cancelled) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Identifiers the listing returned, before the cap.
    pub listed: usize,
    /// Messages fetched and run through the pipeline.
    pub processed: usize,
    /// New records persisted.
    pub stored: usize,
    /// Messages skipped as duplicates of stored records.
    pub duplicates: usize,
    /// Messages that failed to fetch or process.
    pub failed: usize,
}

/// Coordinates mailbox sessions, classification, dedup, and notification.
pub struct SyncOrchestrator {
    store: Arc<dyn EmailStore>,
    connector: Arc<dyn MailConnector>,
    classifier: Arc<EmailClassifier>,
    notifier: Arc<dyn Notifier>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn EmailStore>,
        connector: Arc<dyn MailConnector>,
        classifier: Arc<EmailClassifier>,
        notifier: Arc<dyn Notifier>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            connector,
            classifier,
            notifier,
            settings,
        }
    }

    /// Verify that an account's credentials open a mailbox. Used at
    /// registration time; the only core failure surfaced to an end user.
    pub async fn verify_account(&self, account: &AccountCredentials) -> Result<(), SyncError> {
        let connector = Arc::clone(&self.connector);
        let creds = account.clone();
        tokio::task::spawn_blocking(move || -> Result<(), SyncError> {
            let mut session = connector.connect(&creds.server, creds.port)?;
            session.login(&creds.email, creds.password.expose_secret())?;
            let _ = session.logout();
            Ok(())
        })
        .await
        .map_err(|e| SyncError::Protocol(format!("verification task failed: {e}")))?
    }

    /// Run one sync pass. `cancel` is checked between messages; in-flight
    /// per-message work finishes before the pass stops.
    pub async fn run_pass(
        &self,
        account: &AccountCredentials,
        cancel: Arc<AtomicBool>,
    ) -> Result<PassSummary, SyncError> {
        info!(account = %account.email, "Starting mailbox sync");

        let since = (Utc::now() - chrono::Duration::days(i64::from(self.settings.lookback_days)))
            .date_naive();
        let connector = Arc::clone(&self.connector);
        let creds = account.clone();

        let setup = tokio::task::spawn_blocking(
            move || -> Result<(Box<dyn Mailbox>, Vec<u32>), SyncError> {
                let mut session = connector.connect(&creds.server, creds.port)?;
                session.login(&creds.email, creds.password.expose_secret())?;
                session.select(INBOX_FOLDER)?;
                let ids = session.search_since(since)?;
                Ok((session, ids))
            },
        )
        .await
        .map_err(|e| SyncError::Protocol(format!("sync setup task failed: {e}")))?;

        let (mut session, ids) = match setup {
            Ok(pair) => pair,
            Err(e) => {
                error!(account = %account.email, error = %e, "Mailbox sync aborted");
                return Err(e);
            }
        };

        let mut summary = PassSummary {
            listed: ids.len(),
            ..PassSummary::default()
        };
        let ids: Vec<u32> = ids.into_iter().take(self.settings.message_cap).collect();
        info!(
            account = %account.email,
            listed = summary.listed,
            processing = ids.len(),
            "Listed messages in lookback window"
        );

        for id in ids {
            if cancel.load(Ordering::Relaxed) {
                info!(account = %account.email, "Cancellation requested; stopping pass");
                break;
            }

            let fetched = tokio::task::spawn_blocking(move || {
                let raw = session.fetch(id);
                (session, raw)
            })
            .await;

            let raw = match fetched {
                Ok((returned, Ok(raw))) => {
                    session = returned;
                    raw
                }
                Ok((returned, Err(e))) => {
                    session = returned;
                    summary.failed += 1;
                    error!(account = %account.email, id, error = %e, "Failed to fetch message; continuing");
                    continue;
                }
                Err(e) => {
                    // Session lost with the panicked task; the dropped
                    // stream closes the connection.
                    error!(account = %account.email, id, error = %e, "Fetch task failed; aborting pass");
                    return Err(SyncError::Protocol(format!("fetch task failed: {e}")));
                }
            };

            summary.processed += 1;
            if let Err(e) = self.process_message(&account.email, &raw, &mut summary).await {
                summary.failed += 1;
                error!(account = %account.email, id, error = %e, "Failed to process message; continuing");
            }
        }

        // Unconditional close; close errors are swallowed.
        if let Ok(Err(e)) = tokio::task::spawn_blocking(move || session.logout()).await {
            debug!(account = %account.email, error = %e, "Logout failed; connection dropped");
        }

        info!(
            account = %account.email,
            stored = summary.stored,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "Mailbox sync completed"
        );
        Ok(summary)
    }

    /// Decode, classify, dedup-check, persist, and (for leads) notify.
    async fn process_message(
        &self,
        account: &str,
        raw: &[u8],
        summary: &mut PassSummary,
    ) -> Result<(), SyncError> {
        let decoded = decode_message(raw);
        let category = self.classifier.classify(&decoded.subject, &decoded.body).await;

        if let Some(existing) = self
            .store
            .find_duplicate(account, &decoded.subject, &decoded.sender)
            .await?
        {
            debug!(id = %existing.id, subject = %decoded.subject, "Skipping duplicate message");
            summary.duplicates += 1;
            return Ok(());
        }

        let record = EmailRecord::ingested(account, INBOX_FOLDER, &decoded, category);
        self.store.insert_email(&record).await?;
        summary.stored += 1;

        let preview: String = decoded.subject.chars().take(50).collect();
        info!(subject = %preview, category = %category, "Stored email");

        if category == Category::Interested {
            let notifier = Arc::clone(&self.notifier);
            let lead = record.clone();
            // Fire-and-forget; abandoned on shutdown.
            tokio::spawn(async move {
                notifier.notify_interested(&lead).await;
            });
        }
        Ok(())
    }
}
