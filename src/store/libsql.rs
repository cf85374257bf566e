//! libSQL backend — async `EmailStore` implementation.
//!
//! Supports local file and in-memory databases; the single connection is
//! `Send + Sync` and safe for concurrent async use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{Category, EmailRecord, KnowledgeDoc, MailAccount};
use crate::store::migrations;
use crate::store::traits::{EmailFilter, EmailStore};

const EMAIL_COLUMNS: &str =
    "id, account, folder, subject, sender, recipient, body, date, category, read, suggested_reply, created_at";

/// libSQL store.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn count_where(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;
        let count: i64 = match row {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("count: {e}")))?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string, clamping unreadable values.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn row_to_email(row: &libsql::Row) -> Result<EmailRecord, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("email row: {e}"));

    let id_str: String = row.get(0).map_err(get_err)?;
    let date_str: String = row.get(7).map_err(get_err)?;
    let category_str: Option<String> = row.get(8).ok();
    let read: i64 = row.get(9).map_err(get_err)?;
    let suggested_reply: Option<String> = row.get(10).ok();
    let created_str: String = row.get(11).map_err(get_err)?;

    Ok(EmailRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        account: row.get(1).map_err(get_err)?,
        folder: row.get(2).map_err(get_err)?,
        subject: row.get(3).map_err(get_err)?,
        sender: row.get(4).map_err(get_err)?,
        recipient: row.get(5).map_err(get_err)?,
        body: row.get(6).map_err(get_err)?,
        date: parse_datetime(&date_str),
        category: category_str.as_deref().and_then(Category::from_label),
        read: read != 0,
        suggested_reply,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_account(row: &libsql::Row) -> Result<MailAccount, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("account row: {e}"));
    let port: i64 = row.get(2).map_err(get_err)?;
    let added_str: String = row.get(3).map_err(get_err)?;
    Ok(MailAccount {
        email: row.get(0).map_err(get_err)?,
        server: row.get(1).map_err(get_err)?,
        port: port.clamp(0, i64::from(u16::MAX)) as u16,
        added_at: parse_datetime(&added_str),
    })
}

fn row_to_knowledge(row: &libsql::Row) -> Result<KnowledgeDoc, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("knowledge row: {e}"));
    let id_str: String = row.get(0).map_err(get_err)?;
    let metadata_str: String = row.get(2).map_err(get_err)?;
    let added_str: String = row.get(3).map_err(get_err)?;
    Ok(KnowledgeDoc {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        content: row.get(1).map_err(get_err)?,
        metadata: serde_json::from_str(&metadata_str)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new())),
        added_at: parse_datetime(&added_str),
    })
}

// ── EmailStore ──────────────────────────────────────────────────────

#[async_trait]
impl EmailStore for LibSqlStore {
    async fn insert_email(&self, email: &EmailRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO emails (id, account, folder, subject, sender, recipient, body,
                    date, category, read, suggested_reply, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    email.id.to_string(),
                    email.account.as_str(),
                    email.folder.as_str(),
                    email.subject.as_str(),
                    email.sender.as_str(),
                    email.recipient.as_str(),
                    email.body.as_str(),
                    email.date.to_rfc3339(),
                    opt_text(email.category.map(Category::as_label)),
                    i64::from(email.read),
                    opt_text(email.suggested_reply.as_deref()),
                    email.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_email: {e}")))?;
        debug!(id = %email.id, account = %email.account, "Email inserted");
        Ok(())
    }

    async fn find_duplicate(
        &self,
        account: &str,
        subject: &str,
        sender: &str,
    ) -> Result<Option<EmailRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EMAIL_COLUMNS} FROM emails
                     WHERE account = ?1 AND subject = ?2 AND sender = ?3 LIMIT 1"
                ),
                params![account, subject, sender],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_duplicate: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("find_duplicate: {e}")))?
        {
            Some(row) => Ok(Some(row_to_email(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_email(&self, id: Uuid) -> Result<Option<EmailRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_email: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_email: {e}")))?
        {
            Some(row) => Ok(Some(row_to_email(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_emails(&self, filter: &EmailFilter) -> Result<Vec<EmailRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EMAIL_COLUMNS} FROM emails
                     WHERE (?1 IS NULL OR account = ?1)
                       AND (?2 IS NULL OR folder = ?2)
                       AND (?3 IS NULL OR category = ?3)
                     ORDER BY created_at DESC LIMIT ?4"
                ),
                params![
                    opt_text(filter.account.as_deref()),
                    opt_text(filter.folder.as_deref()),
                    opt_text(filter.category.map(Category::as_label)),
                    filter.limit as i64,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_emails: {e}")))?;

        let mut emails = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_emails: {e}")))?
        {
            emails.push(row_to_email(&row)?);
        }
        Ok(emails)
    }

    async fn set_suggested_reply(&self, id: Uuid, reply: &str) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE emails SET suggested_reply = ?1 WHERE id = ?2",
                params![reply, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_suggested_reply: {e}")))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "email".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn set_read(&self, id: Uuid, read: bool) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE emails SET read = ?1 WHERE id = ?2",
                params![i64::from(read), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_read: {e}")))?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "email".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn count_emails(&self) -> Result<u64, DatabaseError> {
        self.count_where("SELECT COUNT(*) FROM emails", ()).await
    }

    async fn count_by_category(&self, category: Category) -> Result<u64, DatabaseError> {
        self.count_where(
            "SELECT COUNT(*) FROM emails WHERE category = ?1",
            params![category.as_label()],
        )
        .await
    }

    async fn upsert_account(&self, account: &MailAccount) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO accounts (email, server, port, added_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(email) DO UPDATE SET
                    server = excluded.server,
                    port = excluded.port,
                    added_at = excluded.added_at",
                params![
                    account.email.as_str(),
                    account.server.as_str(),
                    i64::from(account.port),
                    account.added_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_account: {e}")))?;
        debug!(account = %account.email, "Account upserted");
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<MailAccount>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT email, server, port, added_at FROM accounts ORDER BY added_at ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_accounts: {e}")))?;

        let mut accounts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_accounts: {e}")))?
        {
            accounts.push(row_to_account(&row)?);
        }
        Ok(accounts)
    }

    async fn count_accounts(&self) -> Result<u64, DatabaseError> {
        self.count_where("SELECT COUNT(*) FROM accounts", ()).await
    }

    async fn insert_knowledge(&self, doc: &KnowledgeDoc) -> Result<(), DatabaseError> {
        let metadata = serde_json::to_string(&doc.metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO knowledge (id, content, metadata, added_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    doc.id.to_string(),
                    doc.content.as_str(),
                    metadata,
                    doc.added_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_knowledge: {e}")))?;
        Ok(())
    }

    async fn list_knowledge(&self) -> Result<Vec<KnowledgeDoc>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, content, metadata, added_at FROM knowledge ORDER BY added_at ASC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_knowledge: {e}")))?;

        let mut docs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_knowledge: {e}")))?
        {
            docs.push(row_to_knowledge(&row)?);
        }
        Ok(docs)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodedEmail;

    fn record(account: &str, subject: &str, sender: &str, category: Category) -> EmailRecord {
        let decoded = DecodedEmail {
            subject: subject.to_string(),
            sender: sender.to_string(),
            recipient: account.to_string(),
            body: "body".to_string(),
        };
        EmailRecord::ingested(account, "INBOX", &decoded, category)
    }

    #[tokio::test]
    async fn insert_and_find_duplicate_by_triple() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let rec = record("me@corp.com", "Hello", "a@x.com", Category::Spam);
        store.insert_email(&rec).await.unwrap();

        let dup = store
            .find_duplicate("me@corp.com", "Hello", "a@x.com")
            .await
            .unwrap();
        assert_eq!(dup.unwrap().id, rec.id);

        // Any differing component of the triple is not a duplicate.
        assert!(store.find_duplicate("me@corp.com", "Hello", "b@x.com").await.unwrap().is_none());
        assert!(store.find_duplicate("me@corp.com", "Other", "a@x.com").await.unwrap().is_none());
        assert!(store.find_duplicate("you@corp.com", "Hello", "a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_email_round_trips_fields() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let rec = record("me@corp.com", "Subj", "a@x.com", Category::OutOfOffice);
        store.insert_email(&rec).await.unwrap();

        let loaded = store.get_email(rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.subject, "Subj");
        assert_eq!(loaded.category, Some(Category::OutOfOffice));
        assert!(!loaded.read);
        assert!(loaded.suggested_reply.is_none());
        assert_eq!(loaded.folder, "INBOX");
    }

    #[tokio::test]
    async fn list_emails_filters_by_account_and_category() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.insert_email(&record("a@corp.com", "s1", "x@x.com", Category::Interested)).await.unwrap();
        store.insert_email(&record("a@corp.com", "s2", "y@x.com", Category::Spam)).await.unwrap();
        store.insert_email(&record("b@corp.com", "s3", "z@x.com", Category::Interested)).await.unwrap();

        let all = store.list_emails(&EmailFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let filter = EmailFilter {
            account: Some("a@corp.com".into()),
            ..EmailFilter::default()
        };
        assert_eq!(store.list_emails(&filter).await.unwrap().len(), 2);

        let filter = EmailFilter {
            category: Some(Category::Interested),
            ..EmailFilter::default()
        };
        assert_eq!(store.list_emails(&filter).await.unwrap().len(), 2);

        let filter = EmailFilter {
            account: Some("b@corp.com".into()),
            category: Some(Category::Interested),
            ..EmailFilter::default()
        };
        let got = store.list_emails(&filter).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].subject, "s3");
    }

    #[tokio::test]
    async fn list_emails_honors_limit() {
        let store = LibSqlStore::new_memory().await.unwrap();
        for i in 0..5 {
            store
                .insert_email(&record("a@corp.com", &format!("s{i}"), "x@x.com", Category::Spam))
                .await
                .unwrap();
        }
        let filter = EmailFilter {
            limit: 2,
            ..EmailFilter::default()
        };
        assert_eq!(store.list_emails(&filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn suggested_reply_and_read_updates() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let rec = record("me@corp.com", "s", "a@x.com", Category::Interested);
        store.insert_email(&rec).await.unwrap();

        store.set_suggested_reply(rec.id, "Sounds good!").await.unwrap();
        store.set_read(rec.id, true).await.unwrap();

        let loaded = store.get_email(rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.suggested_reply.as_deref(), Some("Sounds good!"));
        assert!(loaded.read);
    }

    #[tokio::test]
    async fn updates_on_missing_email_are_not_found() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let missing = Uuid::new_v4();
        assert!(store.set_suggested_reply(missing, "x").await.is_err());
        assert!(store.set_read(missing, true).await.is_err());
    }

    #[tokio::test]
    async fn category_counts() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.insert_email(&record("a@c.com", "s1", "x@x.com", Category::Interested)).await.unwrap();
        store.insert_email(&record("a@c.com", "s2", "y@x.com", Category::Interested)).await.unwrap();
        store.insert_email(&record("a@c.com", "s3", "z@x.com", Category::Spam)).await.unwrap();

        assert_eq!(store.count_emails().await.unwrap(), 3);
        assert_eq!(store.count_by_category(Category::Interested).await.unwrap(), 2);
        assert_eq!(store.count_by_category(Category::Spam).await.unwrap(), 1);
        assert_eq!(store.count_by_category(Category::OutOfOffice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_account_overwrites_by_address() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let mut acct = MailAccount {
            email: "me@corp.com".into(),
            server: "imap.gmail.com".into(),
            port: 993,
            added_at: Utc::now(),
        };
        store.upsert_account(&acct).await.unwrap();

        acct.server = "imap.fastmail.com".into();
        store.upsert_account(&acct).await.unwrap();

        let accounts = store.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].server, "imap.fastmail.com");
        assert_eq!(store.count_accounts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn knowledge_round_trip() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let doc = KnowledgeDoc {
            id: Uuid::new_v4(),
            content: "Our product does X".into(),
            metadata: serde_json::json!({"source": "faq"}),
            added_at: Utc::now(),
        };
        store.insert_knowledge(&doc).await.unwrap();

        let docs = store.list_knowledge().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Our product does X");
        assert_eq!(docs[0].metadata["source"], "faq");
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reachmail.db");
        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store
                .insert_email(&record("a@c.com", "s", "x@x.com", Category::Spam))
                .await
                .unwrap();
        }
        let store = LibSqlStore::new_local(&path).await.unwrap();
        assert_eq!(store.count_emails().await.unwrap(), 1);
    }
}
