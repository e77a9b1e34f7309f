//! Prompt budget enforcement.

use crate::sync::core::message::Message;
use crate::sync::prompt::prompt_builder::build_prompt_block;

/// Prompt parts before formatting.
#[derive(Clone, Debug)]
pub struct PromptParts {
    /// Responder instructions.
    pub instructions: String,
    /// Optional rolling summary.
    pub summary: Option<String>,
    /// Recent conversation turns, oldest first.
    pub turns: Vec<Message>,
    /// Visitor message to answer.
    pub user_message: String,
}

impl PromptParts {
    /// Collect parts, keeping only conversation turns.
    #[must_use]
    pub fn new(
        instructions: impl Into<String>,
        summary: &str,
        recent: &[Message],
        user_message: impl Into<String>,
    ) -> Self {
        let summary = summary.trim();
        Self {
            instructions: instructions.into(),
            summary: (!summary.is_empty()).then(|| summary.to_string()),
            turns: recent.iter().filter(|m| m.is_turn()).cloned().collect(),
            user_message: user_message.into(),
        }
    }

    /// Approximate the character count of the prompt.
    #[must_use]
    pub fn estimate_len(&self) -> usize {
        estimate_len(self)
    }
}

/// Shrink `parts` until the rendered prompt fits `max_chars`.
///
/// Oldest turns are dropped first, then the summary is truncated and finally
/// removed. Instructions and the visitor message are never cut.
#[must_use]
pub fn enforce_budget(mut parts: PromptParts, max_chars: usize) -> PromptParts {
    loop {
        if build_prompt_block(&parts).len() <= max_chars {
            break;
        }

        if !parts.turns.is_empty() {
            parts.turns.remove(0);
            continue;
        }

        let remaining = max_chars.saturating_sub(estimate_len_without_summary(&parts));
        if let Some(summary) = parts.summary.as_mut() {
            if remaining <= 1 {
                parts.summary = None;
            } else if summary.len() + 1 > remaining {
                let truncated = truncate_bytes(summary, remaining - 1);
                if truncated.is_empty() {
                    parts.summary = None;
                } else {
                    *summary = truncated;
                }
            } else {
                parts.summary = None;
            }
            continue;
        }

        break;
    }

    parts
}

fn truncate_bytes(text: &str, max_bytes: usize) -> String {
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        let next = idx + ch.len_utf8();
        if next > max_bytes {
            break;
        }
        end = next;
    }
    text[..end].trim_end().to_string()
}

fn estimate_len(parts: &PromptParts) -> usize {
    let mut total = 0;
    total += "[INSTRUCTIONS]\n".len() + parts.instructions.len() + 1;
    total += "[SUMMARY]\n".len();
    if let Some(summary) = &parts.summary {
        total += summary.len() + 1;
    }
    total += "[RECENT]\n".len();
    for turn in &parts.turns {
        total += turn.text.len() + 14;
    }
    total += "[VISITOR_MESSAGE]\n".len();
    total += parts.user_message.len() + 1;
    total
}

fn estimate_len_without_summary(parts: &PromptParts) -> usize {
    let mut clone = parts.clone();
    clone.summary = None;
    build_prompt_block(&clone).len()
}
