//! Output moderation for generated answers
//!
//! Regex-level only: contact details are redacted, and answers touching
//! self-harm topics are withheld entirely.

use regex::Regex;
use std::sync::LazyLock;

pub const EMAIL_REDACTED: &str = "[email redacted]";
pub const PHONE_REDACTED: &str = "[phone redacted]";
pub const CONTENT_REMOVED: &str = "[Content removed for safety]";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("email pattern is valid")
});

/// Eight or more characters of ASCII digits, spaces and dashes, optionally
/// `+`-prefixed. Other scripts' digits are left alone.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\+?[0-9][0-9\s-]{7,})\b").expect("phone pattern is valid")
});

static SENSITIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)suicide|self-harm").expect("sensitive pattern is valid"));

/// Replace email addresses and phone-like digit runs with placeholders.
pub fn redact(text: &str) -> String {
    let text = EMAIL.replace_all(text, EMAIL_REDACTED);
    PHONE.replace_all(&text, PHONE_REDACTED).into_owned()
}

pub fn is_sensitive(text: &str) -> bool {
    SENSITIVE.is_match(text)
}

/// Final pass over a generated answer before it reaches the user.
pub fn moderate_answer(text: &str) -> String {
    if is_sensitive(text) {
        tracing::warn!("Generated answer withheld by moderation");
        return CONTENT_REMOVED.to_string();
    }
    redact(text)
}
