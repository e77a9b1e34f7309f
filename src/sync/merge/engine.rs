//! Transcript reconciliation between two actor views.

use std::collections::HashSet;

use chrono::Duration;
use tracing::warn;

use crate::sync::core::message::Message;
use crate::sync::merge::dedupe::duplicate_of;

/// Result of a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Reconciled transcript, sorted by timestamp.
    pub messages: Vec<Message>,
    /// Number of incoming messages that were new.
    pub added: usize,
}

impl MergeOutcome {
    /// Whether the merge contributed anything to the local view.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.added > 0
    }
}

/// Merge `incoming` into `local`.
///
/// Every local message survives. Each incoming message is appended unless it
/// duplicates a message already in the output, then the result is stably
/// sorted by timestamp. Content-heuristic matches keep the first-seen copy.
#[must_use]
pub fn merge_messages(local: &[Message], incoming: &[Message], tolerance: Duration) -> MergeOutcome {
    let mut messages: Vec<Message> = local.to_vec();
    let mut ids: HashSet<String> = messages.iter().map(|m| m.id.clone()).collect();
    let mut added = 0;

    for candidate in incoming {
        if ids.contains(&candidate.id) {
            continue;
        }

        let heuristic = messages
            .iter()
            .find(|existing| duplicate_of(existing, candidate, tolerance).is_some());
        if let Some(existing) = heuristic {
            warn!(
                kept = %existing.id,
                dropped = %candidate.id,
                sender = %candidate.sender,
                "Merged messages by content heuristic"
            );
            continue;
        }

        ids.insert(candidate.id.clone());
        messages.push(candidate.clone());
        added += 1;
    }

    messages.sort_by_key(|m| m.timestamp);

    MergeOutcome { messages, added }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::core::ids::{VisitorSessionId, legacy_message_id};
    use crate::sync::store::record::normalize_message;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn tol() -> Duration {
        Duration::seconds(5)
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_scenario_interleaved_views() {
        let widget = vec![Message::user("hi", at(0)).with_id("m1")];
        let crm = vec![Message::operator("hello", at(3)).with_id("m2")];

        let merged = merge_messages(&widget, &crm, tol());
        assert_eq!(ids(&merged.messages), vec!["m1", "m2"]);
        assert_eq!(merged.added, 1);

        let again = merge_messages(&merged.messages, &crm, tol());
        assert_eq!(again.messages, merged.messages);
        assert!(!again.changed());
    }

    #[test]
    fn test_scenario_counterpart_already_holds_local_message() {
        let widget = vec![Message::user("hi", at(0)).with_id("m1")];
        let crm = vec![
            Message::user("hi", at(0)).with_id("m1"),
            Message::operator("hello", at(3)).with_id("m2"),
        ];

        let merged = merge_messages(&widget, &crm, tol());
        assert_eq!(ids(&merged.messages), vec!["m1", "m2"]);
        assert_eq!(merged.added, 1);

        let again = merge_messages(&merged.messages, &crm, tol());
        assert_eq!(again.messages, merged.messages);
        assert_eq!(again.added, 0);
    }

    #[test]
    fn test_scenario_stored_messages_without_ids() {
        let session = VisitorSessionId::new("session_1_abc").unwrap();
        let stored = |secs: i64| {
            normalize_message(
                json!({"text": "hola", "sender": "user", "timestamp": at(secs).timestamp_millis()}),
                &session,
            )
            .unwrap()
        };
        let widget = vec![stored(0)];
        let crm = vec![stored(2)];
        assert_ne!(widget[0].id, crm[0].id);
        assert_eq!(widget[0].id, legacy_message_id(at(0)));

        let merged = merge_messages(&widget, &crm, tol());
        assert_eq!(merged.messages, widget);
        assert!(!merged.changed());
    }

    #[test]
    fn test_scenario_same_text_under_fresh_ids() {
        let widget = vec![Message::user("hola", at(0)).with_id("w-1")];
        let crm = vec![Message::user("hola", at(2)).with_id("c-1")];

        let merged = merge_messages(&widget, &crm, tol());
        assert_eq!(ids(&merged.messages), vec!["w-1"]);
        assert_eq!(merged.added, 0);
    }

    #[test]
    fn test_idempotent() {
        let a = vec![
            Message::user("a", at(0)).with_id("1"),
            Message::ai("b", at(2)).with_id("2"),
        ];
        let b = vec![
            Message::user("a", at(1)).with_id("x"),
            Message::operator("c", at(1)).with_id("3"),
            Message::ai("b", at(2)).with_id("2"),
        ];
        let once = merge_messages(&a, &b, tol());
        let twice = merge_messages(&once.messages, &b, tol());
        assert_eq!(once.messages, twice.messages);
        assert_eq!(twice.added, 0);
    }

    #[test]
    fn test_no_local_loss_and_size_bounds() {
        let local = vec![
            Message::user("q", at(10)).with_id("l1"),
            Message::ai("r", at(11)).with_id("l2"),
        ];
        let incoming = vec![
            Message::operator("s", at(5)).with_id("i1"),
            Message::ai("r", at(11)).with_id("l2"),
        ];
        let merged = merge_messages(&local, &incoming, tol());
        for m in &local {
            assert!(merged.messages.contains(m));
        }
        assert!(merged.messages.len() >= local.len());
        assert!(merged.messages.len() <= local.len() + incoming.len());
    }

    #[test]
    fn test_output_sorted_and_stable() {
        let local = vec![
            Message::user("late", at(9)).with_id("a"),
            Message::user("tie-1", at(4)).with_id("b"),
        ];
        let incoming = vec![
            Message::operator("tie-2", at(4)).with_id("c"),
            Message::operator("early", at(1)).with_id("d"),
        ];
        let merged = merge_messages(&local, &incoming, tol());
        assert_eq!(ids(&merged.messages), vec!["d", "b", "c", "a"]);
        assert!(
            merged
                .messages
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }

    #[test]
    fn test_convergence_without_collisions() {
        let a = vec![
            Message::user("hi", at(0)).with_id("1"),
            Message::ai("hey", at(1)).with_id("2"),
        ];
        let b = vec![
            Message::user("hi", at(0)).with_id("1"),
            Message::operator("taking over", at(7)).with_id("3"),
        ];
        let ab = merge_messages(&a, &b, tol());
        let ba = merge_messages(&b, &a, tol());
        let mut ab_ids = ids(&ab.messages);
        let mut ba_ids = ids(&ba.messages);
        ab_ids.sort_unstable();
        ba_ids.sort_unstable();
        assert_eq!(ab_ids, ba_ids);
    }

    #[test]
    fn test_three_views_converge_in_any_order() {
        let a = vec![
            Message::user("hi", at(0)).with_id("1"),
            Message::ai("hey", at(1)).with_id("2"),
        ];
        let b = vec![
            Message::user("hi", at(0)).with_id("1"),
            Message::operator("taking over", at(7)).with_id("3"),
        ];
        let c = vec![
            Message::ai("hey", at(1)).with_id("2"),
            Message::user("thanks", at(9)).with_id("4"),
        ];

        let abc = merge_messages(&merge_messages(&a, &b, tol()).messages, &c, tol());
        let acb = merge_messages(&merge_messages(&a, &c, tol()).messages, &b, tol());
        assert_eq!(abc.messages, acb.messages);
        assert_eq!(ids(&abc.messages), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_duplicates_inside_incoming_collapse() {
        let incoming = vec![
            Message::user("retry", at(0)).with_id("r1"),
            Message::user("retry", at(1)).with_id("r2"),
        ];
        let merged = merge_messages(&[], &incoming, tol());
        assert_eq!(ids(&merged.messages), vec!["r1"]);
    }

    #[test]
    fn test_empty_inputs() {
        let merged = merge_messages(&[], &[], tol());
        assert!(merged.messages.is_empty());
        assert!(!merged.changed());
    }
}
