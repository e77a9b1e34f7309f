//! Identifier types shared by the widget and the CRM.
//!
//! Both actors must agree on the visitor session id without talking to each
//! other, so ids are plain strings that survive a round-trip through the
//! shared store unchanged.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors returned when parsing/validating a [`VisitorSessionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
    /// Contains a disallowed character.
    InvalidChar {
        /// The invalid character.
        ch: char,
        /// The index where it was found.
        index: usize,
    },
}

impl fmt::Display for SessionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "session id must not be empty"),
            Self::TooLong { max, got } => write!(f, "session id too long: got {got}, max {max}"),
            Self::InvalidChar { ch, index } => {
                write!(
                    f,
                    "session id contains invalid character {ch:?} at index {index}"
                )
            }
        }
    }
}

impl std::error::Error for SessionIdError {}

/// Identifier of one visitor conversation.
///
/// Generated once per store by the widget and used verbatim by the CRM to
/// derive its own record key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VisitorSessionId(String);

impl VisitorSessionId {
    /// Hard ceiling to keep store keys short.
    pub const MAX_LEN: usize = 128;

    /// Length of the random suffix of generated ids.
    const SUFFIX_LEN: usize = 9;

    /// Build a validated id.
    ///
    /// Rules:
    /// - Non-empty after trimming.
    /// - Max length limited.
    /// - ASCII set: `[A-Za-z0-9_-]`.
    ///
    /// # Errors
    /// Returns `SessionIdError` if the input is empty, too long, or contains invalid characters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SessionIdError> {
        let s = raw.as_ref().trim();

        if s.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(SessionIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }

        for (i, ch) in s.chars().enumerate() {
            if !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-')) {
                return Err(SessionIdError::InvalidChar { ch, index: i });
            }
        }

        Ok(Self(s.to_owned()))
    }

    /// Generate a fresh id of the form `session_<millis>_<random>`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("session_{}_{suffix}", now.timestamp_millis()))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitorSessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for VisitorSessionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<VisitorSessionId> for String {
    fn from(value: VisitorSessionId) -> Self {
        value.0
    }
}

impl TryFrom<String> for VisitorSessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Fresh id for a message produced by this process.
#[must_use]
pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}

/// Id for a stored message that arrived without one.
///
/// Matches the legacy `msg_<millis>` shape, so two actors synthesizing an id
/// for the same event may or may not collide; the merge heuristic covers both.
#[must_use]
pub fn legacy_message_id(timestamp: DateTime<Utc>) -> String {
    format!("msg_{}", timestamp.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generated_session_id_is_valid() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let id = VisitorSessionId::generate(now);
        assert!(id.as_str().starts_with("session_1700000000000_"));
        assert_eq!(id.as_str().len(), "session_1700000000000_".len() + 9);
        assert!(VisitorSessionId::new(id.as_str()).is_ok());
    }

    #[test]
    fn test_generated_ids_differ() {
        let now = Utc::now();
        assert_ne!(VisitorSessionId::generate(now), VisitorSessionId::generate(now));
    }

    #[test]
    fn test_session_id_rejects_bad_input() {
        assert_eq!(VisitorSessionId::new("  "), Err(SessionIdError::Empty));
        assert!(matches!(
            VisitorSessionId::new("a b"),
            Err(SessionIdError::InvalidChar { ch: ' ', index: 1 })
        ));
        let long = "x".repeat(VisitorSessionId::MAX_LEN + 1);
        assert!(matches!(
            VisitorSessionId::new(long),
            Err(SessionIdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_session_id_serde_is_transparent_string() {
        let id = VisitorSessionId::new("session_1_abc").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"session_1_abc\"");
        let back: VisitorSessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<VisitorSessionId>("\"bad id\"").is_err());
    }

    #[test]
    fn test_legacy_message_id_uses_millis() {
        let ts = Utc.timestamp_millis_opt(42).unwrap();
        assert_eq!(legacy_message_id(ts), "msg_42");
        assert!(new_message_id().starts_with("msg_"));
    }
}
