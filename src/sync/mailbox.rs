//! Mailbox access — session traits plus a raw IMAP-over-TLS implementation.
//!
//! All session methods are blocking; the orchestrator bridges them into the
//! async world with `tokio::task::spawn_blocking`. Tests substitute scripted
//! implementations of [`Mailbox`] and [`MailConnector`].

use std::io::Write as IoWrite;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::SyncError;

/// Credentials for opening one mailbox. The password never reaches the
/// store or the logs.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountCredentials {
    pub email: String,
    pub password: SecretString,
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_server() -> String {
    "imap.gmail.com".to_string()
}

fn default_port() -> u16 {
    993
}

/// A live mailbox session. Blocking; run under `spawn_blocking`.
pub trait Mailbox: Send {
    fn login(&mut self, user: &str, password: &str) -> Result<(), SyncError>;
    fn select(&mut self, folder: &str) -> Result<(), SyncError>;
    /// List identifiers of messages received on or after `since`.
    fn search_since(&mut self, since: NaiveDate) -> Result<Vec<u32>, SyncError>;
    /// Fetch one full raw message.
    fn fetch(&mut self, id: u32) -> Result<Vec<u8>, SyncError>;
    fn logout(&mut self) -> Result<(), SyncError>;
}

/// Factory for mailbox sessions.
pub trait MailConnector: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Mailbox>, SyncError>;
}

// ── IMAP over rustls ────────────────────────────────────────────────

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Production connector: IMAP over TLS with webpki roots.
pub struct ImapTlsConnector;

impl MailConnector for ImapTlsConnector {
    fn connect(&self, host: &str, port: u16) -> Result<Box<dyn Mailbox>, SyncError> {
        let session = ImapSession::open(host, port)?;
        Ok(Box::new(session))
    }
}

/// One IMAP session over a `rustls` stream.
struct ImapSession {
    tls: rustls::StreamOwned<rustls::ClientConnection, TcpStream>,
    tag: u32,
}

impl ImapSession {
    fn open(host: &str, port: u16) -> Result<Self, SyncError> {
        let connect_err = |reason: String| SyncError::Connect {
            host: host.to_string(),
            port,
            reason,
        };

        let tcp = TcpStream::connect((host, port)).map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| connect_err(e.to_string()))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
            .map_err(|e| connect_err(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connect_err(e.to_string()))?;

        let mut session = Self {
            tls: rustls::StreamOwned::new(conn, tcp),
            tag: 0,
        };
        // Server greeting
        session.read_line()?;
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, SyncError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match std::io::Read::read(&mut self.tls, &mut byte) {
                Ok(0) => return Err(SyncError::Protocol("connection closed".into())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send one tagged command and collect lines up to the tagged response.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, SyncError> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        let full = format!("{tag} {cmd}\r\n");
        IoWrite::write_all(&mut self.tls, full.as_bytes())?;
        IoWrite::flush(&mut self.tls)?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }
}

/// Quote an IMAP string literal, escaping backslashes and quotes.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn completed_ok(lines: &[String]) -> bool {
    lines
        .last()
        .is_some_and(|l| l.split_whitespace().nth(1) == Some("OK"))
}

impl Mailbox for ImapSession {
    fn login(&mut self, user: &str, password: &str) -> Result<(), SyncError> {
        let lines = self.command(&format!("LOGIN {} {}", quote(user), quote(password)))?;
        if !completed_ok(&lines) {
            return Err(SyncError::Auth {
                account: user.to_string(),
                reason: "IMAP login rejected".into(),
            });
        }
        Ok(())
    }

    fn select(&mut self, folder: &str) -> Result<(), SyncError> {
        let lines = self.command(&format!("SELECT {}", quote(folder)))?;
        if !completed_ok(&lines) {
            return Err(SyncError::Protocol(format!("SELECT {folder} failed")));
        }
        Ok(())
    }

    fn search_since(&mut self, since: NaiveDate) -> Result<Vec<u32>, SyncError> {
        let lines = self.command(&format!("SEARCH SINCE {}", since.format("%d-%b-%Y")))?;
        if !completed_ok(&lines) {
            return Err(SyncError::Protocol("SEARCH failed".into()));
        }

        let mut ids = Vec::new();
        for line in &lines {
            if line.starts_with("* SEARCH") {
                ids.extend(
                    line.split_whitespace()
                        .skip(2)
                        .filter_map(|t| t.parse::<u32>().ok()),
                );
            }
        }
        Ok(ids)
    }

    fn fetch(&mut self, id: u32) -> Result<Vec<u8>, SyncError> {
        let lines = self
            .command(&format!("FETCH {id} RFC822"))
            .map_err(|e| SyncError::Fetch {
                uid: id,
                reason: e.to_string(),
            })?;
        if !completed_ok(&lines) {
            return Err(SyncError::Fetch {
                uid: id,
                reason: "FETCH rejected".into(),
            });
        }

        // Drop the untagged FETCH header line and the tagged completion.
        let raw: String = lines
            .iter()
            .skip(1)
            .take(lines.len().saturating_sub(2))
            .cloned()
            .collect();
        Ok(raw.into_bytes())
    }

    fn logout(&mut self) -> Result<(), SyncError> {
        self.command("LOGOUT")?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
