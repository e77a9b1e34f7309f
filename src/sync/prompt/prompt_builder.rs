//! Prompt rendering for the responder.

use crate::sync::core::message::{Message, Sender};
use crate::sync::prompt::prompt_budget::PromptParts;

/// Build a deterministic prompt block from prepared parts.
#[must_use]
pub fn build_prompt_block(parts: &PromptParts) -> String {
    let mut out = String::with_capacity(parts.estimate_len());

    out.push_str("[INSTRUCTIONS]\n");
    out.push_str(&parts.instructions);
    out.push('\n');

    out.push_str("[SUMMARY]\n");
    if let Some(summary) = &parts.summary {
        out.push_str(summary);
        out.push('\n');
    }

    out.push_str("[RECENT]\n");
    for turn in &parts.turns {
        render_turn(&mut out, turn);
    }

    out.push_str("[VISITOR_MESSAGE]\n");
    out.push_str(&parts.user_message);
    out.push('\n');

    out
}

fn render_turn(out: &mut String, turn: &Message) {
    let role = match turn.sender {
        Sender::User => "Visitor",
        Sender::Ai => "Assistant",
        Sender::Operator => "Advisor",
        Sender::System => return,
    };
    out.push_str("- ");
    out.push_str(role);
    out.push_str(": ");
    out.push_str(&turn.text);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_block_layout() {
        let now = Utc::now();
        let parts = PromptParts::new(
            "Be brief.",
            "Topics: refund.",
            &[Message::user("hi", now), Message::operator("hello", now)],
            "refund?",
        );
        assert_eq!(
            build_prompt_block(&parts),
            "[INSTRUCTIONS]\nBe brief.\n[SUMMARY]\nTopics: refund.\n[RECENT]\n\
             - Visitor: hi\n- Advisor: hello\n[VISITOR_MESSAGE]\nrefund?\n"
        );
    }
}
