//! Merge engine for two views of one transcript.

pub mod dedupe;
pub mod engine;

pub use dedupe::{DuplicateMatch, duplicate_of, normalize_text};
pub use engine::{MergeOutcome, merge_messages};
