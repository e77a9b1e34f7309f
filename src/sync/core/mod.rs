//! Core synchronization types and identifiers.

pub mod clock;
pub mod config;
pub mod control;
pub mod errors;
pub mod ids;
pub mod message;

pub use clock::{Clock, ManualClock, SystemClock, next_timestamp};
pub use config::{
    CrmConfig, MergeConfig, MessageTexts, PromptConfig, ResponderConfig, StorageConfig,
    SummaryConfig, SyncConfig, WidgetConfig,
};
pub use control::{ControlAction, ControlRecord, ControlState, reviewing_indicator};
pub use errors::{SyncError, SyncResult};
pub use ids::{SessionIdError, VisitorSessionId, legacy_message_id, new_message_id};
pub use message::{Message, Sender, awaiting_reply, last_turn};
