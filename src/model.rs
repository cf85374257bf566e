//! Core domain types — ingested emails, mail accounts, product knowledge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decode::DecodedEmail;

/// Classification label assigned to an ingested email.
///
/// Closed set — anything else coming back from the model is coerced to
/// `NotInterested` at the classifier boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Interested,
    #[serde(rename = "Meeting Booked")]
    MeetingBooked,
    #[serde(rename = "Not Interested")]
    NotInterested,
    Spam,
    #[serde(rename = "Out of Office")]
    OutOfOffice,
}

impl Category {
    /// All categories, in the order the classifier prompt lists them.
    pub const ALL: [Category; 5] = [
        Category::Interested,
        Category::MeetingBooked,
        Category::NotInterested,
        Category::Spam,
        Category::OutOfOffice,
    ];

    /// Wire/storage label for this category.
    pub fn as_label(self) -> &'static str {
        match self {
            Category::Interested => "Interested",
            Category::MeetingBooked => "Meeting Booked",
            Category::NotInterested => "Not Interested",
            Category::Spam => "Spam",
            Category::OutOfOffice => "Out of Office",
        }
    }

    /// Parse an exact label. No trimming, no case folding — callers that
    /// want lenient handling trim first.
    pub fn from_label(s: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.as_label() == s)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A persisted, classified email.
///
/// Functional identity for deduplication is `(account, subject, sender)`;
/// `id` is an opaque row identity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: Uuid,
    pub account: String,
    pub folder: String,
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub category: Option<Category>,
    pub read: bool,
    pub suggested_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EmailRecord {
    /// Build a fresh record for a just-decoded message.
    pub fn ingested(
        account: &str,
        folder: &str,
        decoded: &DecodedEmail,
        category: Category,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account: account.to_string(),
            folder: folder.to_string(),
            subject: decoded.subject.clone(),
            sender: decoded.sender.clone(),
            recipient: decoded.recipient.clone(),
            body: decoded.body.clone(),
            date: now,
            category: Some(category),
            read: false,
            suggested_reply: None,
            created_at: now,
        }
    }
}

/// A registered mailbox account. The credential is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAccount {
    pub email: String,
    pub server: String,
    pub port: u16,
    pub added_at: DateTime<Utc>,
}

/// A stored piece of product knowledge (future RAG input for replies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    pub id: Uuid,
    pub content: String,
    pub metadata: serde_json::Value,
    pub added_at: DateTime<Utc>,
}

// ── Tests ───────────────────────────────────────────────────────────
