//! Dependencies shared by the actors.

use std::sync::Arc;

use crate::llm::responder::{ReplyRequest, Responder};
use crate::sync::core::clock::{Clock, SystemClock};
use crate::sync::core::config::SyncConfig;
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::message::Message;
use crate::sync::store::adapter::StoreAdapter;
use crate::sync::summary::rolling::RollingSummary;

/// Store, responder, clock and configuration handed to every actor.
#[derive(Clone)]
pub struct ActorContext {
    /// Typed shared store.
    pub store: StoreAdapter,
    /// Reply generator.
    pub responder: Arc<dyn Responder>,
    /// Timestamp source.
    pub clock: Arc<dyn Clock>,
    /// Validated configuration.
    pub config: Arc<SyncConfig>,
}

impl ActorContext {
    /// Bundle dependencies, validating the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(
        store: StoreAdapter,
        responder: Arc<dyn Responder>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            responder,
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
        })
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn rolling_summary(&self) -> SyncResult<RollingSummary> {
        RollingSummary::new(&self.config.summary).map_err(SyncError::from)
    }

    /// Reply request for `user_message` given the turns that preceded it.
    pub(crate) fn reply_request(
        &self,
        summary: &str,
        history: &[Message],
        user_message: &str,
    ) -> ReplyRequest {
        let turns: Vec<&Message> = history.iter().filter(|m| m.is_turn()).collect();
        let start = turns.len().saturating_sub(self.config.widget.recent_turns);
        ReplyRequest {
            instructions: self.config.prompt.instructions.clone(),
            summary: summary.to_string(),
            recent: turns[start..].iter().map(|m| (*m).clone()).collect(),
            user_message: user_message.to_string(),
            max_chars: self.config.responder.max_reply_chars,
        }
    }
}
