//! Prompt construction for the AI responder.

pub mod prompt_budget;
pub mod prompt_builder;

pub use prompt_budget::{PromptParts, enforce_budget};
pub use prompt_builder::build_prompt_block;
