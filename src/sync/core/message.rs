//! Transcript message model shared by both actors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::sync::core::ids::new_message_id;

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The visitor typing into the widget.
    User,
    /// Automated reply from the responder.
    Ai,
    /// Human operator working in the CRM.
    Operator,
    /// Transcript annotation (control changes).
    System,
}

impl Sender {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::Operator => "operator",
            Self::System => "system",
        }
    }

    /// Translate any sender string seen in stored transcripts.
    ///
    /// Older widget and CRM builds wrote `flofy`, `bot`, `asesor` and
    /// `advisor` alongside the canonical names.
    #[must_use]
    pub fn from_legacy(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "visitor" | "client" | "customer" => Some(Self::User),
            "ai" | "bot" | "flofy" | "assistant" => Some(Self::Ai),
            "operator" | "asesor" | "advisor" | "agent" | "human" => Some(Self::Operator),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_legacy(value).ok_or_else(|| value.to_string())
    }
}

/// A single transcript entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Primary dedup key, unique within a conversation after merge.
    pub id: String,
    /// User-visible content.
    pub text: String,
    /// Normalized author.
    pub sender: Sender,
    /// Ordering instant.
    pub timestamp: DateTime<Utc>,
    /// Transcript-only annotation, never sent to the responder.
    pub is_system: bool,
}

impl Message {
    /// Build a message with a fresh id.
    #[must_use]
    pub fn new(sender: Sender, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: new_message_id(),
            text: text.into(),
            sender,
            timestamp,
            is_system: matches!(sender, Sender::System),
        }
    }

    /// Build a visitor message.
    #[must_use]
    pub fn user(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Sender::User, text, timestamp)
    }

    /// Build an automated reply.
    #[must_use]
    pub fn ai(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Sender::Ai, text, timestamp)
    }

    /// Build an operator reply.
    #[must_use]
    pub fn operator(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Sender::Operator, text, timestamp)
    }

    /// Build a transcript annotation.
    #[must_use]
    pub fn system(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Sender::System, text, timestamp)
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether this message is conversation content (not an annotation).
    #[must_use]
    pub const fn is_turn(&self) -> bool {
        !self.is_system && !matches!(self.sender, Sender::System)
    }
}

/// Latest conversation turn, skipping annotations.
#[must_use]
pub fn last_turn(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.is_turn())
}

/// Whether the visitor spoke last and nobody has answered yet.
#[must_use]
pub fn awaiting_reply(messages: &[Message]) -> bool {
    last_turn(messages).is_some_and(|m| m.sender == Sender::User)
}
