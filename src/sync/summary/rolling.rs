//! Rolling keyword digest of a conversation.
//!
//! Each update appends one line listing the salient words of the new turns.
//! When the digest outgrows its budget the oldest lines go first.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::sync::core::config::SummaryConfig;
use crate::sync::core::message::Message;

const STOP_WORDS: &[&str] = &[
    // English
    "about", "after", "again", "also", "because", "been", "before", "being", "could", "does",
    "doing", "from", "have", "having", "hello", "here", "just", "like", "more", "much", "need",
    "only", "other", "please", "should", "some", "than", "thank", "thanks", "that", "their",
    "them", "then", "there", "these", "they", "this", "those", "very", "want", "were", "what",
    "when", "where", "which", "while", "will", "with", "would", "your", "yours",
    // Spanish
    "aqui", "ahora", "algo", "como", "cual", "cuando", "desde", "donde", "esta", "estan", "estas",
    "este", "esto", "gracias", "hola", "hasta", "para", "pero", "porque", "puede", "quiero",
    "sobre", "solo", "tambien", "tengo", "tiene", "todo", "usted",
    // French
    "avec", "bonjour", "dans", "merci", "mais", "nous", "pour", "vous",
];

/// Keyword digest builder.
pub struct RollingSummary {
    max_chars: usize,
    keywords_per_update: usize,
    min_keyword_chars: usize,
    token: Regex,
}

impl RollingSummary {
    /// Create a digest builder.
    ///
    /// # Errors
    /// Returns an error if the tokenizer pattern is invalid.
    pub fn new(config: &SummaryConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            max_chars: config.max_chars,
            keywords_per_update: config.keywords_per_update,
            min_keyword_chars: config.min_keyword_chars,
            token: Regex::new(r"\p{L}[\p{L}\p{N}'_-]*")?,
        })
    }

    /// Salient words of `turns`, most frequent first, ties by first use.
    ///
    /// Annotations are ignored.
    #[must_use]
    pub fn keywords(&self, turns: &[Message]) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut order = 0;

        for turn in turns.iter().filter(|m| m.is_turn()) {
            for found in self.token.find_iter(&turn.text) {
                let word = found.as_str().to_lowercase();
                if word.chars().count() < self.min_keyword_chars || STOP_WORDS.contains(&word.as_str())
                {
                    continue;
                }
                let entry = counts.entry(word).or_insert((0, order));
                entry.0 += 1;
                order += 1;
            }
        }

        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
        ranked
            .into_iter()
            .take(self.keywords_per_update)
            .map(|(word, _)| word)
            .collect()
    }

    /// Append a line for `new_turns` to `existing` and compact to budget.
    ///
    /// Returns `existing` unchanged when the new turns carry no keywords.
    #[must_use]
    pub fn update(&self, existing: &str, new_turns: &[Message]) -> String {
        let keywords = self.keywords(new_turns);
        if keywords.is_empty() {
            return existing.to_string();
        }

        let mut summary = existing.trim_end().to_string();
        if !summary.is_empty() {
            summary.push('\n');
        }
        summary.push_str("Topics: ");
        summary.push_str(&keywords.join(", "));
        summary.push('.');

        compact(&summary, self.max_chars)
    }
}

/// Drop the oldest lines of `summary` until it fits `max_chars`.
///
/// A single remaining line that is still too long is cut at a char boundary.
#[must_use]
pub fn compact(summary: &str, max_chars: usize) -> String {
    let mut lines: Vec<&str> = summary.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut dropped = 0;

    while lines.len() > 1 && joined_len(&lines) > max_chars {
        lines.remove(0);
        dropped += 1;
    }

    if dropped > 0 {
        debug!(dropped, "Compacted rolling summary");
    }

    let joined = lines.join("\n");
    if joined.chars().count() > max_chars {
        return joined
            .chars()
            .take(max_chars)
            .collect::<String>()
            .trim_end()
            .to_string();
    }
    joined
}

fn joined_len(lines: &[&str]) -> usize {
    lines.iter().map(|l| l.chars().count()).sum::<usize>() + lines.len().saturating_sub(1)
}
