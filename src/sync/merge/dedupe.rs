//! Duplicate detection between transcript messages.

use chrono::Duration;

use crate::sync::core::message::Message;

/// Normalize text for comparison (trim, lowercase, collapse whitespace).
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut prev_space = false;

    for ch in text.trim().chars() {
        if ch.is_whitespace() {
            if !prev_space {
                normalized.push(' ');
                prev_space = true;
            }
        } else {
            normalized.extend(ch.to_lowercase());
            prev_space = false;
        }
    }

    normalized
}

/// Why two messages were considered the same.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DuplicateMatch {
    /// Identical ids.
    Id,
    /// Same sender and text, timestamps within the tolerance.
    Content,
}

/// Whether `candidate` duplicates `existing`.
///
/// Ids are compared first. Only messages with different ids fall through to
/// the content heuristic, which catches one logical message written twice
/// under fresh ids (for example a retried send).
#[must_use]
pub fn duplicate_of(
    existing: &Message,
    candidate: &Message,
    tolerance: Duration,
) -> Option<DuplicateMatch> {
    if existing.id == candidate.id {
        return Some(DuplicateMatch::Id);
    }

    let delta = existing.timestamp.signed_duration_since(candidate.timestamp).abs();
    if existing.sender == candidate.sender
        && delta < tolerance
        && normalize_text(&existing.text) == normalize_text(&candidate.text)
    {
        return Some(DuplicateMatch::Content);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(millis: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hola \n  MUNDO "), "hola mundo");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_id_match_wins_regardless_of_content() {
        let a = Message::user("one", at(0)).with_id("m1");
        let b = Message::ai("two", at(60_000)).with_id("m1");
        assert_eq!(
            duplicate_of(&a, &b, Duration::seconds(5)),
            Some(DuplicateMatch::Id)
        );
    }

    #[test]
    fn test_content_match_inside_tolerance() {
        let a = Message::user("Hola", at(0)).with_id("a");
        let b = Message::user("hola ", at(2_000)).with_id("b");
        assert_eq!(
            duplicate_of(&a, &b, Duration::seconds(5)),
            Some(DuplicateMatch::Content)
        );
    }

    #[test]
    fn test_content_match_requires_sender_and_window() {
        let tolerance = Duration::seconds(5);
        let a = Message::user("hola", at(0)).with_id("a");
        let other_sender = Message::ai("hola", at(1_000)).with_id("b");
        let too_late = Message::user("hola", at(5_000)).with_id("c");
        assert_eq!(duplicate_of(&a, &other_sender, tolerance), None);
        assert_eq!(duplicate_of(&a, &too_late, tolerance), None);
    }
}
