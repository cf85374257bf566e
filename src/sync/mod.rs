//! Mailbox synchronization — sessions, per-account passes, task registry.

pub mod mailbox;
pub mod orchestrator;
pub mod registry;

pub use mailbox::{AccountCredentials, ImapTlsConnector, MailConnector, Mailbox};
pub use orchestrator::{PassSummary, SyncOrchestrator, SyncSettings};
pub use registry::SyncRegistry;
