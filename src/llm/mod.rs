//! AI responder integration.

pub mod ollama;
pub mod responder;

pub use ollama::OllamaResponder;
pub use responder::{ReplyRequest, Responder, ResponderError, ResponderFuture, truncate_reply};
