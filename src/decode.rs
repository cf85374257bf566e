//! MIME normalization — raw message bytes to plain-text fields.
//!
//! Decoding never fails: missing headers become empty strings, undecodable
//! bodies degrade to a lossy raw form, and the body is truncated to
//! [`MAX_BODY_CHARS`] before anything downstream sees it.

use mail_parser::{Address, MessageParser};

/// Hard upper bound on stored/classified body text, in characters.
pub const MAX_BODY_CHARS: usize = 2000;

/// Plain-text view of one raw mailbox message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedEmail {
    pub subject: String,
    pub sender: String,
    pub recipient: String,
    pub body: String,
}

/// Decode a raw RFC 822 message into subject/sender/recipient/body.
///
/// Encoded header words (RFC 2047) are decoded segment by segment; a header
/// that is absent yields an empty string. The body is the first `text/plain`
/// part, falling back to stripped HTML, then to a lossy rendering of the raw
/// bytes when the message cannot be parsed at all.
pub fn decode_message(raw: &[u8]) -> DecodedEmail {
    let Some(parsed) = MessageParser::default().parse(raw) else {
        return DecodedEmail {
            body: truncate_chars(&String::from_utf8_lossy(raw), MAX_BODY_CHARS),
            ..DecodedEmail::default()
        };
    };

    let subject = parsed.subject().unwrap_or_default().to_string();
    let sender = format_address(parsed.from());
    let recipient = format_address(parsed.to());

    let body = if let Some(text) = parsed.body_text(0) {
        text.to_string()
    } else if let Some(html) = parsed.body_html(0) {
        strip_html(html.as_ref())
    } else {
        String::new()
    };

    DecodedEmail {
        subject,
        sender,
        recipient,
        body: truncate_chars(&body, MAX_BODY_CHARS),
    }
}

/// Render the first mailbox of an address header as `Name <addr>`.
fn format_address(addr: Option<&Address<'_>>) -> String {
    match addr.and_then(|a| a.first()) {
        Some(a) => match (a.name(), a.address()) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (None, Some(email)) => email.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => String::new(),
        },
        None => String::new(),
    }
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &str, body: &str) -> Vec<u8> {
        format!("{headers}\r\n\r\n{body}").into_bytes()
    }

    #[test]
    fn decodes_plain_message() {
        let msg = raw(
            "From: Alice <alice@example.com>\r\nTo: me@corp.com\r\nSubject: Hello",
            "Just checking in.",
        );
        let decoded = decode_message(&msg);
        assert_eq!(decoded.subject, "Hello");
        assert_eq!(decoded.sender, "Alice <alice@example.com>");
        assert_eq!(decoded.recipient, "me@corp.com");
        assert_eq!(decoded.body, "Just checking in.");
    }

    #[test]
    fn mixed_encoded_and_plain_subject_words_joined_by_space() {
        // "=?utf-8?B?SMOpbGxv?=" decodes to "Héllo"; the plain ASCII word
        // keeps its separating space.
        let msg = raw(
            "From: a@x.com\r\nSubject: =?utf-8?B?SMOpbGxv?= world",
            "body",
        );
        let decoded = decode_message(&msg);
        assert_eq!(decoded.subject, "Héllo world");
    }

    #[test]
    fn missing_headers_yield_empty_strings() {
        let msg = raw("X-Other: nothing useful", "content");
        let decoded = decode_message(&msg);
        assert_eq!(decoded.subject, "");
        assert_eq!(decoded.sender, "");
        assert_eq!(decoded.recipient, "");
    }

    #[test]
    fn multipart_picks_first_text_plain_part() {
        let msg = concat!(
            "From: a@x.com\r\n",
            "Subject: Multi\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>Rich <b>text</b></p>\r\n",
            "--b1\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Plain text wins\r\n",
            "--b1--\r\n",
        );
        let decoded = decode_message(msg.as_bytes());
        assert_eq!(decoded.body.trim(), "Plain text wins");
    }

    #[test]
    fn html_only_message_is_stripped() {
        let msg = concat!(
            "From: a@x.com\r\n",
            "Subject: Html\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<div>Hello <i>there</i></div>\r\n",
        );
        let decoded = decode_message(msg.as_bytes());
        assert!(decoded.body.contains("Hello"));
        assert!(!decoded.body.contains('<'));
    }

    #[test]
    fn body_truncated_to_2000_chars() {
        let long_body = "x".repeat(5000);
        let msg = raw("From: a@x.com\r\nSubject: Long", &long_body);
        let decoded = decode_message(&msg);
        assert_eq!(decoded.body.chars().count(), MAX_BODY_CHARS);
        assert_eq!(decoded.body, long_body[..MAX_BODY_CHARS]);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let s = "é".repeat(10);
        assert_eq!(truncate_chars(&s, 4), "éééé");
    }

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No HTML here"), "No HTML here");
    }
}
