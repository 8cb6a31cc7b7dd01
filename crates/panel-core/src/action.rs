//! Action-key parsing: `"  GPIO.Blink "` → `ActionKey { domain: "gpio", verb: Some("blink") }`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static RE_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z0-9_-]+)(?:\.([a-z0-9_-]+))?$").unwrap());

/// A parsed action key: a domain, optionally followed by a verb.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub domain: String,
    pub verb: Option<String>,
}

impl ActionKey {
    /// Trim and lowercase. Idempotent.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Parse a raw action string. Returns `None` for empty, whitespace-only
    /// or malformed keys; callers treat that as an unknown action.
    pub fn parse(raw: &str) -> Option<Self> {
        let norm = Self::normalize(raw);
        if norm.is_empty() {
            return None;
        }
        let caps = RE_ACTION.captures(&norm)?;
        Some(Self {
            domain: caps[1].to_string(),
            verb: caps.get(2).map(|m| m.as_str().to_string()),
        })
    }

    pub fn verb(&self) -> Option<&str> {
        self.verb.as_deref()
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.verb {
            Some(verb) => write!(f, "{}.{}", self.domain, verb),
            None => write!(f, "{}", self.domain),
        }
    }
}
