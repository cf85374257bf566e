//! AI classifier — maps (subject, body) to a sales-intent [`Category`].
//!
//! `classify` is total: a model failure or an off-script answer both
//! degrade to `NotInterested`, the most conservative label. Callers never
//! observe an error.

use std::sync::Arc;

use tracing::warn;

use crate::error::LlmError;
use crate::llm::GenerativeModel;
use crate::model::Category;

/// Fixed instruction: answer with exactly one label, nothing else.
const SYSTEM_PROMPT: &str = "\
You are an email categorization AI. Analyze the email and respond with ONLY ONE of these categories:
- Interested
- Meeting Booked
- Not Interested
- Spam
- Out of Office

Respond with just the category name, nothing else.";

/// Portion of the body included in the classification prompt.
const PROMPT_BODY_CHARS: usize = 500;

/// Sales-intent classifier over a generative model.
pub struct EmailClassifier {
    model: Arc<dyn GenerativeModel>,
}

impl EmailClassifier {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Classify an email. Always returns one of the five labels.
    pub async fn classify(&self, subject: &str, body: &str) -> Category {
        match self.try_classify(subject, body).await {
            Ok(category) => category,
            Err(e) => {
                warn!(error = %e, "Classification failed, defaulting to Not Interested");
                Category::NotInterested
            }
        }
    }

    /// Internal fallible variant. An answer that is not an exact label is
    /// already coerced here; only transport/endpoint failures surface.
    async fn try_classify(&self, subject: &str, body: &str) -> Result<Category, LlmError> {
        let excerpt: String = body.chars().take(PROMPT_BODY_CHARS).collect();
        let prompt = format!("Subject: {subject}\n\nBody: {excerpt}");
        let answer = self.model.generate(SYSTEM_PROMPT, &prompt).await?;
        Ok(Category::from_label(answer.trim()).unwrap_or(Category::NotInterested))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Stub model returning a canned answer (or a canned failure).
    struct StubModel {
        answer: Option<String>,
        last_prompt: Mutex<String>,
    }

    impl StubModel {
        fn replying(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Some(answer.to_string()),
                last_prompt: Mutex::new(String::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: None,
                last_prompt: Mutex::new(String::new()),
            })
        }
    }

    #[async_trait]
    impl GenerativeModel for StubModel {
        async fn generate(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            match &self.answer {
                Some(a) => Ok(a.clone()),
                None => Err(LlmError::RequestFailed {
                    reason: "simulated outage".into(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn exact_label_is_returned() {
        let model = StubModel::replying("Meeting Booked");
        let classifier = EmailClassifier::new(model);
        let got = classifier.classify("Re: demo", "see you at 3pm").await;
        assert_eq!(got, Category::MeetingBooked);
    }

    #[tokio::test]
    async fn surrounding_whitespace_is_trimmed() {
        let model = StubModel::replying("  Interested\n");
        let classifier = EmailClassifier::new(model);
        assert_eq!(classifier.classify("s", "b").await, Category::Interested);
    }

    #[tokio::test]
    async fn off_script_answer_coerced_to_not_interested() {
        let model = StubModel::replying("This looks like a very promising lead!");
        let classifier = EmailClassifier::new(model);
        assert_eq!(classifier.classify("s", "b").await, Category::NotInterested);
    }

    #[tokio::test]
    async fn model_error_coerced_to_not_interested() {
        let classifier = EmailClassifier::new(StubModel::failing());
        assert_eq!(classifier.classify("s", "b").await, Category::NotInterested);
    }

    #[tokio::test]
    async fn empty_inputs_still_yield_a_label() {
        let classifier = EmailClassifier::new(StubModel::replying("Spam"));
        assert_eq!(classifier.classify("", "").await, Category::Spam);
    }

    #[tokio::test]
    async fn prompt_includes_subject_and_truncated_body() {
        let model = StubModel::replying("Interested");
        let classifier = EmailClassifier::new(Arc::clone(&model) as Arc<dyn GenerativeModel>);
        let long_body = "y".repeat(3000);
        classifier.classify("Pricing question", &long_body).await;

        let prompt = model.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("Subject: Pricing question"));
        // Only the first 500 body chars go to the model.
        assert!(prompt.contains(&"y".repeat(500)));
        assert!(!prompt.contains(&"y".repeat(501)));
    }
}
