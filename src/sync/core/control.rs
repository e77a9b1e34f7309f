//! AI/human control hand-off for a conversation.
//!
//! Only the CRM moves the state; the widget reads it. Each state accepts
//! exactly one action, so concurrent last-write-wins updates of the control
//! key cannot produce a state that no operator asked for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::core::message::{Message, awaiting_reply};

/// Who answers the visitor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    /// The responder answers automatically.
    #[default]
    AiControlled,
    /// An operator has claimed the conversation.
    HumanControlled,
}

impl ControlState {
    /// Whether a human holds the conversation.
    #[must_use]
    pub const fn is_human(self) -> bool {
        matches!(self, Self::HumanControlled)
    }
}

/// Operator action on the control state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlAction {
    /// Suspend automatic replies.
    TakeControl,
    /// Resume automatic replies.
    HandBackToAi,
}

impl ControlAction {
    /// Resulting state, or `None` when the action does not apply.
    #[must_use]
    pub const fn apply(self, state: ControlState) -> Option<ControlState> {
        match (self, state) {
            (Self::TakeControl, ControlState::AiControlled) => Some(ControlState::HumanControlled),
            (Self::HandBackToAi, ControlState::HumanControlled) => Some(ControlState::AiControlled),
            _ => None,
        }
    }
}

/// Stored control flag of one conversation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRecord {
    /// Single source of truth for the hand-off state.
    pub is_human_controlled: bool,
    /// Instant of the last flip.
    #[serde(default)]
    pub last_control_change_at: Option<DateTime<Utc>>,
}

impl ControlRecord {
    /// Record for the given state flipped at `at`.
    #[must_use]
    pub const fn flipped(state: ControlState, at: DateTime<Utc>) -> Self {
        Self {
            is_human_controlled: state.is_human(),
            last_control_change_at: Some(at),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ControlState {
        if self.is_human_controlled {
            ControlState::HumanControlled
        } else {
            ControlState::AiControlled
        }
    }
}

/// Whether the widget shows "someone is reviewing your message".
///
/// Depends only on the state and the transcript. Comparing the flip time
/// with the local clock would make the indicator flicker under clock skew.
#[must_use]
pub fn reviewing_indicator(state: ControlState, messages: &[Message]) -> bool {
    state.is_human() && awaiting_reply(messages)
}
