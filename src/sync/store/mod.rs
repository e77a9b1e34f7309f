//! Shared key-value store and its typed adapter.

pub mod adapter;
pub mod keys;
pub mod memory_store;
pub mod record;
pub mod shared_store;
pub mod sqlite_store;

pub use adapter::StoreAdapter;
pub use memory_store::MemoryStore;
pub use record::{ConversationRecord, ConversationSummary, normalize_message, parse_record};
pub use shared_store::{SharedStore, StoreFuture};
pub use sqlite_store::SqliteStore;
