//! Conversation synchronization between the visitor widget and the CRM.
//!
//! Both sides share nothing but a key-value store. Each actor owns its own
//! transcript key, periodically merges the other side's view into it, and
//! reads a shared control record to decide who answers the visitor.

pub mod actors;
pub mod core;
pub mod merge;
pub mod prompt;
pub mod store;
pub mod summary;
