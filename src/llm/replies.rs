//! AI reply generator — drafts three reply-length variants for an email.
//!
//! The model is asked for a JSON object with exactly `short`, `medium`,
//! `detailed`. Because the endpoint gives no structured-output guarantee,
//! parsing runs a ladder: full response as JSON, then the first balanced
//! `{...}` span inside it, then a raw-text fallback. `generate` is total —
//! even an outright model failure yields three non-empty strings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LlmError;
use crate::llm::GenerativeModel;

const SYSTEM_PROMPT: &str = "\
You are a concise assistant that writes professional email replies. \
Use the user profile and booking link to produce three variants: short, medium, detailed. \
Return valid JSON: {\"short\": \"...\", \"medium\": \"...\", \"detailed\": \"...\"}.";

/// The three reply-length variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyVariants {
    pub short: String,
    pub medium: String,
    pub detailed: String,
}

/// Reply drafter over a generative model.
pub struct ReplyGenerator {
    model: Arc<dyn GenerativeModel>,
}

impl ReplyGenerator {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Draft reply variants for an incoming email. Never fails.
    pub async fn generate(
        &self,
        incoming_email: &str,
        user_name: &str,
        booking_link: Option<&str>,
        tone: &str,
    ) -> ReplyVariants {
        let prompt = build_prompt(incoming_email, user_name, booking_link, tone);
        match self.model.generate(SYSTEM_PROMPT, &prompt).await {
            Ok(text) => parse_response(&text),
            Err(e) => {
                warn!(error = %e, "Reply generation failed, using fallback text");
                error_fallback(&e)
            }
        }
    }
}

fn build_prompt(
    incoming_email: &str,
    user_name: &str,
    booking_link: Option<&str>,
    tone: &str,
) -> String {
    format!(
        "Incoming email:\n\"\"\"{incoming_email}\"\"\"\n\n\
         User name: {user_name}\nBooking link: {link}\nPreferred tone: {tone}\n\n\
         Instructions:\n\
         - If the incoming email asks to schedule, include the booking link as: \
         \"You can book a time here: {link}\".\n\
         - Keep short <=1 sentence, medium 1-2 sentences, detailed up to 3 sentences.\n\n\
         Return only valid JSON with keys: short, medium, detailed",
        link = booking_link.unwrap_or("None"),
    )
}

/// Parsing ladder over the raw model output. First success wins.
fn parse_response(text: &str) -> ReplyVariants {
    let trimmed = text.trim();

    if let Some(variants) = parse_json_object(trimmed) {
        return variants;
    }
    if let Some(span) = first_brace_span(trimmed)
        && let Some(variants) = parse_json_object(span)
    {
        return variants;
    }

    // Not JSON at all — tier the raw text by length.
    ReplyVariants {
        short: trimmed.chars().take(100).collect(),
        medium: trimmed.chars().take(300).collect(),
        detailed: trimmed.to_string(),
    }
}

/// Parse a JSON object, substituting empty strings for missing keys.
fn parse_json_object(s: &str) -> Option<ReplyVariants> {
    let value: serde_json::Value = serde_json::from_str(s).ok()?;
    let obj = value.as_object()?;
    let get = |key: &str| {
        obj.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Some(ReplyVariants {
        short: get("short"),
        medium: get("medium"),
        detailed: get("detailed"),
    })
}

/// Find the first balanced `{...}` span, honoring JSON string literals.
pub(crate) fn first_brace_span(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Fixed apologetic fallback when the model call itself fails. The error
/// text rides along in `detailed` for diagnostic visibility.
fn error_fallback(e: &LlmError) -> ReplyVariants {
    ReplyVariants {
        short: "Thank you for reaching out.".to_string(),
        medium: "Thank you for reaching out. I appreciate your interest.".to_string(),
        detailed: format!(
            "Thank you for reaching out. I appreciate your interest and would love to \
             discuss further. Error: {e}"
        ),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    struct StubModel {
        answer: Result<String, ()>,
    }

    impl StubModel {
        fn replying(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(answer.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { answer: Err(()) })
        }
    }

    #[async_trait]
    impl GenerativeModel for StubModel {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, LlmError> {
            match &self.answer {
                Ok(a) => Ok(a.clone()),
                Err(()) => Err(LlmError::RequestFailed {
                    reason: "simulated outage".into(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn clean_json_response() {
        let model = StubModel::replying(
            r#"{"short": "Thanks!", "medium": "Thanks, happy to chat.", "detailed": "Thanks — happy to chat this week."}"#,
        );
        let generated = ReplyGenerator::new(model)
            .generate("Can we talk?", "Sam", None, "professional")
            .await;
        assert_eq!(generated.short, "Thanks!");
        assert_eq!(generated.medium, "Thanks, happy to chat.");
        assert_eq!(generated.detailed, "Thanks — happy to chat this week.");
    }

    #[tokio::test]
    async fn json_embedded_in_prose() {
        let model = StubModel::replying(
            "Sure, here is the JSON you asked for:\n{\"short\": \"Hi\", \"medium\": \"Hi there\", \"detailed\": \"Hi there, thanks\"}\nLet me know!",
        );
        let generated = ReplyGenerator::new(model)
            .generate("x", "Sam", None, "casual")
            .await;
        assert_eq!(generated.short, "Hi");
        assert_eq!(generated.detailed, "Hi there, thanks");
    }

    #[tokio::test]
    async fn missing_keys_become_empty_strings() {
        let model = StubModel::replying(r#"{"short": "Hi"}"#);
        let generated = ReplyGenerator::new(model).generate("x", "Sam", None, "t").await;
        assert_eq!(generated.short, "Hi");
        assert_eq!(generated.medium, "");
        assert_eq!(generated.detailed, "");
    }

    #[tokio::test]
    async fn plain_prose_falls_back_to_length_tiers() {
        let prose = "a".repeat(400);
        let model = StubModel::replying(&prose);
        let generated = ReplyGenerator::new(model).generate("x", "Sam", None, "t").await;
        assert_eq!(generated.short.len(), 100);
        assert_eq!(generated.medium.len(), 300);
        assert_eq!(generated.detailed.len(), 400);
    }

    #[tokio::test]
    async fn model_failure_yields_apologetic_fallback() {
        let generated = ReplyGenerator::new(StubModel::failing())
            .generate("x", "Sam", None, "t")
            .await;
        assert!(generated.short.starts_with("Thank you"));
        assert!(!generated.medium.is_empty());
        assert!(generated.detailed.contains("simulated outage"));
    }

    #[test]
    fn brace_span_finds_first_balanced_object() {
        let s = r#"noise {"a": {"b": 1}} trailing {"c": 2}"#;
        assert_eq!(first_brace_span(s), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn brace_span_ignores_braces_inside_strings() {
        let s = r#"x {"short": "literal } brace"} y"#;
        assert_eq!(first_brace_span(s), Some(r#"{"short": "literal } brace"}"#));
    }

    #[test]
    fn brace_span_none_when_unbalanced() {
        assert_eq!(first_brace_span("{ never closes"), None);
        assert_eq!(first_brace_span("no braces at all"), None);
    }

    #[test]
    fn prompt_embeds_booking_link_phrasing() {
        let prompt = build_prompt("mail", "Sam", Some("https://cal.example/sam"), "warm");
        assert!(prompt.contains("Booking link: https://cal.example/sam"));
        assert!(prompt.contains("You can book a time here: https://cal.example/sam"));
        let without = build_prompt("mail", "Sam", None, "warm");
        assert!(without.contains("Booking link: None"));
    }
}
