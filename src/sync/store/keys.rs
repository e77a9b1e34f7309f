//! Shared store key layout.
//!
//! The store has no namespaces, so ownership is encoded in the key prefix:
//! the widget writes `chat_*` keys, the CRM writes `crm_*` keys, and the
//! control key is written by the CRM and read by both.

use crate::sync::core::ids::VisitorSessionId;

/// Key holding the visitor session id of this store.
pub const VISITOR_SESSION_KEY: &str = "chat_visitor_session";
/// Prefix of widget-owned conversation records.
pub const WIDGET_RECORD_PREFIX: &str = "chat_session_";
/// Prefix of CRM-owned conversation mirrors.
pub const CRM_RECORD_PREFIX: &str = "crm_conversation_";
/// Key holding the CRM conversation list.
pub const CRM_SUMMARIES_KEY: &str = "crm_conversations";
/// Prefix of per-conversation control records.
pub const CONTROL_PREFIX: &str = "chat_control_";

/// Widget-owned record of a conversation.
#[must_use]
pub fn widget_record(session_id: &VisitorSessionId) -> String {
    format!("{WIDGET_RECORD_PREFIX}{session_id}")
}

/// CRM-owned mirror of a conversation.
#[must_use]
pub fn crm_record(session_id: &VisitorSessionId) -> String {
    format!("{CRM_RECORD_PREFIX}{session_id}")
}

/// Control record of a conversation.
#[must_use]
pub fn control(session_id: &VisitorSessionId) -> String {
    format!("{CONTROL_PREFIX}{session_id}")
}

/// Session id encoded in a widget record key.
#[must_use]
pub fn session_from_widget_key(key: &str) -> Option<VisitorSessionId> {
    key.strip_prefix(WIDGET_RECORD_PREFIX)
        .and_then(|raw| VisitorSessionId::new(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_share_session_suffix() {
        let id = VisitorSessionId::new("session_1_abc").unwrap();
        assert_eq!(widget_record(&id), "chat_session_session_1_abc");
        assert_eq!(crm_record(&id), "crm_conversation_session_1_abc");
        assert_eq!(control(&id), "chat_control_session_1_abc");
    }

    #[test]
    fn test_session_from_widget_key() {
        let id = VisitorSessionId::new("session_1_abc").unwrap();
        assert_eq!(session_from_widget_key(&widget_record(&id)), Some(id));
        assert_eq!(session_from_widget_key("crm_conversation_x"), None);
        assert_eq!(session_from_widget_key("chat_session_"), None);
    }
}
