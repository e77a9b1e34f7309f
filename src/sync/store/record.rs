//! Stored conversation records and their normalization.
//!
//! Records are written canonically but read leniently: transcripts persisted
//! by older widget and CRM builds use other sender names, an `isFromBot`
//! flag instead of a sender, epoch-millis timestamps, or no id at all.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::sync::core::control::ControlRecord;
use crate::sync::core::ids::{VisitorSessionId, legacy_message_id};
use crate::sync::core::message::{Message, Sender};

/// One actor's view of a conversation as stored under its own key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Visitor session the record belongs to.
    pub session_id: VisitorSessionId,
    /// Reconciled transcript.
    pub messages: Vec<Message>,
    /// Mirror of the control flag at write time.
    pub is_human_controlled: bool,
    /// Mirror of the last control flip.
    pub last_control_change_at: Option<DateTime<Utc>>,
    /// Rolling keyword digest.
    pub summary: String,
    /// Timestamp of the newest message.
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    /// Empty record for a new conversation.
    #[must_use]
    pub const fn new(session_id: VisitorSessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            is_human_controlled: false,
            last_control_change_at: None,
            summary: String::new(),
            last_activity_at: None,
        }
    }

    /// Copy the control flag into the record.
    pub fn mirror_control(&mut self, control: &ControlRecord) {
        self.is_human_controlled = control.is_human_controlled;
        self.last_control_change_at = control.last_control_change_at;
    }

    /// Recompute `last_activity_at` from the transcript.
    pub fn touch(&mut self) {
        self.last_activity_at = self.messages.iter().map(|m| m.timestamp).max();
    }
}

/// Entry of the CRM conversation list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Visitor session id.
    pub id: VisitorSessionId,
    /// Text of the latest turn.
    pub last_message: String,
    /// Timestamp of the latest activity.
    pub timestamp: Option<DateTime<Utc>>,
    /// Current control flag.
    pub is_human_controlled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    session_id: VisitorSessionId,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    is_human_controlled: bool,
    #[serde(default)]
    last_control_change_at: Option<DateTime<Utc>>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "content")]
    text: Option<String>,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default)]
    is_from_bot: Option<bool>,
    #[serde(default, alias = "createdAt")]
    timestamp: Option<Value>,
    #[serde(default)]
    is_system: Option<bool>,
}

/// Parse a stored record, normalizing every message.
///
/// # Errors
/// Returns an error if the payload is not a record at all. Individual
/// messages that cannot be normalized are dropped with a warning.
pub fn parse_record(raw: &str) -> Result<ConversationRecord, serde_json::Error> {
    let record: RawRecord = serde_json::from_str(raw)?;
    let messages = record
        .messages
        .into_iter()
        .filter_map(|value| normalize_message(value, &record.session_id))
        .collect();

    Ok(ConversationRecord {
        session_id: record.session_id,
        messages,
        is_human_controlled: record.is_human_controlled,
        last_control_change_at: record.last_control_change_at,
        summary: record.summary,
        last_activity_at: record.last_activity_at,
    })
}

/// Normalize one stored message into the canonical model.
#[must_use]
pub fn normalize_message(value: Value, session_id: &VisitorSessionId) -> Option<Message> {
    let raw: RawMessage = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(%session_id, %err, "Dropping unreadable stored message");
            return None;
        }
    };

    let Some(text) = raw.text else {
        warn!(%session_id, "Dropping stored message without text");
        return None;
    };

    let Some(timestamp) = raw.timestamp.as_ref().and_then(parse_timestamp) else {
        warn!(%session_id, "Dropping stored message without a usable timestamp");
        return None;
    };

    let sender = match (raw.sender.as_deref(), raw.is_from_bot, raw.is_system) {
        (Some(name), _, _) => match Sender::from_legacy(name) {
            Some(sender) => sender,
            None => {
                warn!(%session_id, sender = name, "Dropping stored message with unknown sender");
                return None;
            }
        },
        (None, _, Some(true)) => Sender::System,
        (None, Some(true), _) => Sender::Ai,
        (None, Some(false) | None, _) => Sender::User,
    };

    let is_system = raw.is_system.unwrap_or(false) || sender == Sender::System;
    let id = raw
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| legacy_message_id(timestamp));

    Some(Message {
        id,
        text,
        sender,
        timestamp,
        is_system,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> VisitorSessionId {
        VisitorSessionId::new("session_1_abc").unwrap()
    }

    #[test]
    fn test_canonical_record_roundtrip() {
        let mut record = ConversationRecord::new(session());
        record.messages.push(Message::user("hi", Utc::now()).with_id("m1"));
        record.touch();
        let raw = serde_json::to_string(&record).unwrap();
        assert_eq!(parse_record(&raw).unwrap(), record);
    }

    #[test]
    fn test_legacy_message_fields_normalize() {
        let value = json!({
            "content": "hola",
            "sender": "flofy",
            "createdAt": 1_700_000_000_000_i64
        });
        let msg = normalize_message(value, &session()).unwrap();
        assert_eq!(msg.sender, Sender::Ai);
        assert_eq!(msg.text, "hola");
        assert_eq!(msg.id, "msg_1700000000000");
        assert!(!msg.is_system);
    }

    #[test]
    fn test_is_from_bot_flag_maps_sender() {
        let bot = json!({"text": "hi", "isFromBot": true, "timestamp": "2024-05-01T10:00:00Z"});
        let user = json!({"text": "hi", "isFromBot": false, "timestamp": "2024-05-01T10:00:00Z"});
        assert_eq!(normalize_message(bot, &session()).unwrap().sender, Sender::Ai);
        assert_eq!(normalize_message(user, &session()).unwrap().sender, Sender::User);
    }

    #[test]
    fn test_asesor_and_system_strings() {
        let op = json!({"id": "a", "text": "x", "sender": "asesor", "timestamp": 1});
        let sys = json!({"id": "b", "text": "y", "sender": "system", "timestamp": 2});
        assert_eq!(normalize_message(op, &session()).unwrap().sender, Sender::Operator);
        let sys = normalize_message(sys, &session()).unwrap();
        assert_eq!(sys.sender, Sender::System);
        assert!(sys.is_system);
    }

    #[test]
    fn test_unusable_messages_are_dropped() {
        let raw = json!({
            "sessionId": "session_1_abc",
            "messages": [
                {"id": "ok", "text": "fine", "sender": "user", "timestamp": 5},
                {"id": "no-ts", "text": "x", "sender": "user"},
                {"id": "no-text", "sender": "user", "timestamp": 5},
                {"id": "weird", "text": "x", "sender": "robot", "timestamp": 5},
                42
            ]
        })
        .to_string();
        let record = parse_record(&raw).unwrap();
        let ids: Vec<&str> = record.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
        assert!(!record.is_human_controlled);
    }

    #[test]
    fn test_non_record_payload_is_an_error() {
        assert!(parse_record("[1,2,3]").is_err());
        assert!(parse_record("not json").is_err());
    }
}
