//! Application configuration, built from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default trailing window for mailbox listings, in days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Default per-pass processing cap (throughput guard, not correctness).
pub const DEFAULT_MESSAGE_CAP: usize = 50;

/// Backend configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address the HTTP API binds to.
    pub bind: String,
    /// Path of the local libSQL database file.
    pub db_path: String,
    /// Gemini API key.
    pub gemini_api_key: SecretString,
    /// Gemini model name.
    pub model: String,
    /// Slack incoming-webhook URL for lead notifications. `None` disables.
    pub slack_webhook_url: Option<String>,
    /// Trailing window for mailbox listings, in days.
    pub lookback_days: u32,
    /// Maximum messages processed per sync pass.
    pub message_cap: usize,
    /// Name signed under generated replies.
    pub user_name: String,
    /// Scheduling link embedded in replies when the sender asks to meet.
    pub booking_link: Option<String>,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let gemini_api_key = std::env::var("GOOGLE_API_KEY")
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingEnvVar("GOOGLE_API_KEY".into()))?;

        Ok(Self {
            bind: std::env::var("REACHMAIL_BIND").unwrap_or_else(|_| "0.0.0.0:8000".into()),
            db_path: std::env::var("REACHMAIL_DB_PATH")
                .unwrap_or_else(|_| "./data/reachmail.db".into()),
            gemini_api_key,
            model: std::env::var("REACHMAIL_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".into()),
            slack_webhook_url: std::env::var("SLACK_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            lookback_days: parse_env("SYNC_LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?,
            message_cap: parse_env("SYNC_MESSAGE_CAP", DEFAULT_MESSAGE_CAP)?,
            user_name: std::env::var("REACHMAIL_USER_NAME").unwrap_or_else(|_| "User".into()),
            booking_link: std::env::var("REACHMAIL_BOOKING_LINK")
                .ok()
                .filter(|s| !s.is_empty()),
        })
    }
}

/// Parse an optional env var, falling back to `default` when unset.
/// A set-but-unparsable value is a hard config error, not a silent default.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_uses_default_when_unset() {
        // SAFETY: tests do not read this variable concurrently.
        unsafe { std::env::remove_var("REACHMAIL_TEST_UNSET") };
        let v: u32 = parse_env("REACHMAIL_TEST_UNSET", 30).unwrap();
        assert_eq!(v, 30);
    }

    #[test]
    fn parse_env_rejects_garbage() {
        // SAFETY: variable is only touched by this test.
        unsafe { std::env::set_var("REACHMAIL_TEST_GARBAGE", "not-a-number") };
        let v: Result<u32, _> = parse_env("REACHMAIL_TEST_GARBAGE", 1);
        assert!(v.is_err());
    }
}
