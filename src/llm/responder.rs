//! Responder contract used by the actors.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::sync::core::message::Message;
use crate::sync::prompt::{PromptParts, build_prompt_block, enforce_budget};

/// Boxed future type for responder calls.
pub type ResponderFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ResponderError>> + Send + 'a>>;

/// Why no reply was produced.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// The endpoint could not be reached or the request timed out.
    #[error("network error: {0}")]
    Network(String),
    /// The endpoint answered with a non-success status.
    #[error("upstream returned status {status}")]
    Upstream {
        /// HTTP status code.
        status: u16,
    },
    /// The endpoint answered with something that is not a reply.
    #[error("malformed response")]
    MalformedResponse,
}

/// Everything a responder needs to answer one visitor message.
#[derive(Clone, Debug)]
pub struct ReplyRequest {
    /// Responder instructions.
    pub instructions: String,
    /// Rolling summary of the conversation.
    pub summary: String,
    /// Recent turns preceding the visitor message.
    pub recent: Vec<Message>,
    /// Visitor message to answer.
    pub user_message: String,
    /// Reply length limit in characters.
    pub max_chars: usize,
}

impl ReplyRequest {
    /// Render the prompt for this request within `max_prompt_chars`.
    #[must_use]
    pub fn prompt(&self, max_prompt_chars: usize) -> String {
        let parts = PromptParts::new(
            self.instructions.clone(),
            &self.summary,
            &self.recent,
            self.user_message.clone(),
        );
        build_prompt_block(&enforce_budget(parts, max_prompt_chars))
    }
}

/// Produces a reply for a visitor message.
pub trait Responder: Send + Sync {
    /// Answer `request`.
    ///
    /// # Errors
    /// Returns an error if no reply could be produced.
    fn respond(&self, request: ReplyRequest) -> ResponderFuture<'_>;
}

/// Cut `reply` to at most `max_chars` characters, preferring a word boundary.
#[must_use]
pub fn truncate_reply(reply: &str, max_chars: usize) -> String {
    let reply = reply.trim();
    if reply.chars().count() <= max_chars {
        return reply.to_string();
    }

    let budget = max_chars.saturating_sub(1);
    let cut: String = reply.chars().take(budget).collect();
    let at_boundary = reply.chars().nth(budget).is_some_and(char::is_whitespace);
    let cut = match cut.rfind(char::is_whitespace) {
        Some(idx) if !at_boundary && idx > budget / 2 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_short_reply_untouched() {
        assert_eq!(truncate_reply("  hello there ", 50), "hello there");
    }

    #[test]
    fn test_long_reply_cut_on_word() {
        let cut = truncate_reply("the quick brown fox jumps over the lazy dog", 20);
        assert_eq!(cut, "the quick brown fox…");
        assert!(cut.chars().count() <= 20);
    }

    #[test]
    fn test_long_word_cut_hard() {
        let cut = truncate_reply("abcdefghijklmnopqrstuvwxyz", 10);
        assert_eq!(cut, "abcdefghi…");
    }

    #[test]
    fn test_prompt_skips_annotations() {
        let now = Utc::now();
        let request = ReplyRequest {
            instructions: "Be brief.".to_string(),
            summary: String::new(),
            recent: vec![
                Message::user("hi", now),
                Message::system("AI has resumed the conversation", now),
            ],
            user_message: "where is my order?".to_string(),
            max_chars: 100,
        };
        let prompt = request.prompt(4000);
        assert!(prompt.contains("- Visitor: hi"));
        assert!(!prompt.contains("resumed"));
        assert!(prompt.ends_with("where is my order?\n"));
    }
}

#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod testing {
    //! Responder doubles.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{ReplyRequest, Responder, ResponderError, ResponderFuture};

    /// Answers every request with the same scripted result.
    pub struct ScriptedResponder {
        reply: Option<String>,
        calls: AtomicUsize,
        last: Mutex<Option<ReplyRequest>>,
    }

    impl ScriptedResponder {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<ReplyRequest> {
            self.last.lock().ok().and_then(|guard| guard.clone())
        }
    }

    impl Responder for ScriptedResponder {
        fn respond(&self, request: ReplyRequest) -> ResponderFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut guard) = self.last.lock() {
                *guard = Some(request);
            }
            let result = self
                .reply
                .clone()
                .ok_or(ResponderError::Upstream { status: 503 });
            Box::pin(async move { result })
        }
    }
}
