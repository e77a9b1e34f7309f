//! Configuration for the synchronization subsystem.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::sync::core::errors::{SyncError, SyncResult};

/// Top-level configuration shared by both actors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Widget actor settings.
    pub widget: WidgetConfig,
    /// CRM actor settings.
    pub crm: CrmConfig,
    /// Merge engine settings.
    pub merge: MergeConfig,
    /// Rolling summary settings.
    pub summary: SummaryConfig,
    /// Prompt construction settings.
    pub prompt: PromptConfig,
    /// AI responder settings.
    pub responder: ResponderConfig,
    /// Durable storage settings.
    pub storage: StorageConfig,
    /// Fixed transcript texts.
    pub messages: MessageTexts,
}

impl SyncConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> SyncResult<()> {
        if self.widget.poll_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "widget.poll_interval_ms must be > 0".to_string(),
            ));
        }

        if self.widget.recent_turns == 0 {
            return Err(SyncError::InvalidConfig(
                "widget.recent_turns must be > 0".to_string(),
            ));
        }

        if self.widget.idle_ttl_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "widget.idle_ttl_secs must be > 0".to_string(),
            ));
        }

        if self.merge.dedup_tolerance_ms < 0 {
            return Err(SyncError::InvalidConfig(
                "merge.dedup_tolerance_ms must be >= 0".to_string(),
            ));
        }

        if self.crm.poll_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "crm.poll_interval_ms must be > 0".to_string(),
            ));
        }

        if self.summary.max_chars == 0 {
            return Err(SyncError::InvalidConfig(
                "summary.max_chars must be > 0".to_string(),
            ));
        }

        if self.prompt.max_chars == 0 {
            return Err(SyncError::InvalidConfig(
                "prompt.max_chars must be > 0".to_string(),
            ));
        }

        if self.responder.max_reply_chars == 0 {
            return Err(SyncError::InvalidConfig(
                "responder.max_reply_chars must be > 0".to_string(),
            ));
        }

        if self.messages.apology.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "messages.apology must not be empty".to_string(),
            ));
        }

        Url::parse(&self.responder.base_url)?;

        Ok(())
    }
}

/// Widget actor settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Reconciliation period in milliseconds.
    pub poll_interval_ms: u64,
    /// Number of recent turns sent to the responder.
    pub recent_turns: usize,
    /// Seconds without visitor activity before a hosted widget is evicted.
    pub idle_ttl_secs: u64,
}

impl WidgetConfig {
    /// Poll period as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Idle eviction delay as a `Duration`.
    #[must_use]
    pub const fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            recent_turns: 10,
            idle_ttl_secs: 1800,
        }
    }
}

/// CRM actor settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Reconciliation period in milliseconds.
    pub poll_interval_ms: u64,
}

impl CrmConfig {
    /// Poll period as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
        }
    }
}

/// Merge engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Window in which same-text, same-sender messages are one message.
    pub dedup_tolerance_ms: i64,
}

impl MergeConfig {
    /// Tolerance as a `chrono` duration.
    #[must_use]
    pub const fn tolerance(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.dedup_tolerance_ms)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            dedup_tolerance_ms: 5000,
        }
    }
}

/// Rolling summary settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Max summary size in characters.
    pub max_chars: usize,
    /// Keywords kept per update sentence.
    pub keywords_per_update: usize,
    /// Shortest token considered a keyword.
    pub min_keyword_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_chars: 600,
            keywords_per_update: 6,
            min_keyword_chars: 4,
        }
    }
}

/// Prompt construction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Maximum prompt size in characters.
    pub max_chars: usize,
    /// System instructions placed at the top of every prompt.
    pub instructions: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_chars: 4000,
            instructions: "You are a friendly customer-support assistant. Answer briefly, \
                           in the visitor's language, and never invent account details."
                .to_string(),
        }
    }
}

/// AI responder settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Completion model name.
    pub model: String,
    /// Base URL of the completion endpoint.
    pub base_url: String,
    /// Replies longer than this are truncated.
    pub max_reply_chars: usize,
    /// Temperature for generation.
    pub temperature: f64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            base_url: "http://127.0.0.1:11434".to_string(),
            max_reply_chars: 800,
            temperature: 0.4,
            timeout_secs: 60,
        }
    }
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Key-value table name.
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chatbridge.sqlite"),
            table: "kv".to_string(),
        }
    }
}

/// Fixed texts appended to transcripts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageTexts {
    /// Shown to the visitor when the responder fails.
    pub apology: String,
    /// System message appended on take-control.
    pub operator_joined: String,
    /// System message appended on hand-back.
    pub ai_resumed: String,
}

impl Default for MessageTexts {
    fn default() -> Self {
        Self {
            apology: "Sorry, I could not answer right now. An advisor will get back to you shortly."
                .to_string(),
            operator_joined: "An operator has joined the conversation".to_string(),
            ai_resumed: "AI has resumed the conversation".to_string(),
        }
    }
}
