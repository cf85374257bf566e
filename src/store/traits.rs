//! `EmailStore` — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{Category, EmailRecord, KnowledgeDoc, MailAccount};

/// Filters for listing stored emails. All conditions are exact-match.
#[derive(Debug, Clone)]
pub struct EmailFilter {
    pub account: Option<String>,
    pub folder: Option<String>,
    pub category: Option<Category>,
    pub limit: usize,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self {
            account: None,
            folder: None,
            category: None,
            limit: 50,
        }
    }
}

/// Backend-agnostic document store for emails, accounts, and knowledge.
#[async_trait]
pub trait EmailStore: Send + Sync {
    // ── Emails ──────────────────────────────────────────────────────

    /// Insert a new email record.
    async fn insert_email(&self, email: &EmailRecord) -> Result<(), DatabaseError>;

    /// Look up a stored email matching the functional dedup key
    /// `(account, subject, sender)` exactly.
    async fn find_duplicate(
        &self,
        account: &str,
        subject: &str,
        sender: &str,
    ) -> Result<Option<EmailRecord>, DatabaseError>;

    /// Get an email by id.
    async fn get_email(&self, id: Uuid) -> Result<Option<EmailRecord>, DatabaseError>;

    /// List emails matching the filter, newest first.
    async fn list_emails(&self, filter: &EmailFilter) -> Result<Vec<EmailRecord>, DatabaseError>;

    /// Attach a suggested reply to a stored email.
    async fn set_suggested_reply(&self, id: Uuid, reply: &str) -> Result<(), DatabaseError>;

    /// Update the read flag.
    async fn set_read(&self, id: Uuid, read: bool) -> Result<(), DatabaseError>;

    /// Total number of stored emails.
    async fn count_emails(&self) -> Result<u64, DatabaseError>;

    /// Number of stored emails with the given category.
    async fn count_by_category(&self, category: Category) -> Result<u64, DatabaseError>;

    // ── Accounts ────────────────────────────────────────────────────

    /// Insert or update a registered account (keyed by address).
    async fn upsert_account(&self, account: &MailAccount) -> Result<(), DatabaseError>;

    /// All registered accounts.
    async fn list_accounts(&self) -> Result<Vec<MailAccount>, DatabaseError>;

    /// Number of registered accounts.
    async fn count_accounts(&self) -> Result<u64, DatabaseError>;

    // ── Knowledge ───────────────────────────────────────────────────

    /// Store a product-knowledge document.
    async fn insert_knowledge(&self, doc: &KnowledgeDoc) -> Result<(), DatabaseError>;

    /// All stored knowledge documents.
    async fn list_knowledge(&self) -> Result<Vec<KnowledgeDoc>, DatabaseError>;
}
