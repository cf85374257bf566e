//! ReachMail — AI-powered email aggregator backend.
//!
//! Pulls mail over IMAP, classifies each message by sales intent with
//! Gemini, deduplicates and persists to libSQL, pushes Slack notifications
//! for interested leads, and drafts AI replies. A small REST API exposes
//! accounts, emails, knowledge, and stats.

pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod llm;
pub mod model;
pub mod notify;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
