//! Visitor-facing actor.
//!
//! Owns the `chat_session_<id>` record. Visitor messages are answered by the
//! responder while the conversation is AI-controlled; otherwise they wait for
//! the operator and the widget shows the reviewing indicator.

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::llm::responder::truncate_reply;
use crate::sync::actors::context::ActorContext;
use crate::sync::actors::poller::{BusyFlag, Reconcile, TickFuture, TickOutcome, TickReport};
use crate::sync::core::clock::next_timestamp;
use crate::sync::core::control::{ControlRecord, ControlState, reviewing_indicator};
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::VisitorSessionId;
use crate::sync::core::message::Message;
use crate::sync::merge::engine::merge_messages;
use crate::sync::store::keys;
use crate::sync::store::record::ConversationRecord;
use crate::sync::summary::rolling::RollingSummary;

/// What the visitor currently sees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSnapshot {
    /// Visitor session id.
    pub session_id: VisitorSessionId,
    /// Reconciled transcript.
    pub messages: Vec<Message>,
    /// "Someone is reviewing your message" indicator.
    pub is_reviewing: bool,
    /// Last observed control flag.
    pub is_human_controlled: bool,
}

/// Result of a visitor message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    /// The stored visitor message.
    pub message: Message,
    /// Automated reply, absent while an operator is in control.
    pub reply: Option<Message>,
    /// Whether the message now waits for an operator.
    pub awaiting_operator: bool,
}

struct WidgetState {
    record: ConversationRecord,
    control: ControlRecord,
    reviewing: bool,
    pending_write: bool,
}

/// Visitor-side actor for one conversation.
pub struct WidgetActor {
    ctx: ActorContext,
    session_id: VisitorSessionId,
    summary: RollingSummary,
    state: Mutex<WidgetState>,
    busy: BusyFlag,
}

impl WidgetActor {
    /// Open the widget for this store's visitor, creating the session id on
    /// first use.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn load(ctx: ActorContext) -> SyncResult<Self> {
        let session_id = ctx.store.load_or_create_session(ctx.clock.as_ref()).await?;
        Self::open(ctx, session_id).await
    }

    /// Open the widget for a known session, restoring its stored transcript.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn open(ctx: ActorContext, session_id: VisitorSessionId) -> SyncResult<Self> {
        let key = keys::widget_record(&session_id);
        let record = match ctx.store.read_record(&key).await {
            Ok(Some(record)) if record.session_id == session_id => record,
            Ok(Some(record)) => {
                warn!(%session_id, stored = %record.session_id, "Widget record names another session, starting fresh");
                ConversationRecord::new(session_id.clone())
            }
            Ok(None) => ConversationRecord::new(session_id.clone()),
            Err(SyncError::Serialization(err)) => {
                warn!(%session_id, %err, "Widget record unreadable, starting fresh");
                ConversationRecord::new(session_id.clone())
            }
            Err(err) => return Err(err),
        };

        let control = ctx.store.read_control(&session_id).await;
        let reviewing = reviewing_indicator(control.state(), &record.messages);
        let summary = ctx.rolling_summary()?;
        debug!(%session_id, messages = record.messages.len(), "Opened widget");

        Ok(Self {
            ctx,
            session_id,
            summary,
            state: Mutex::new(WidgetState {
                record,
                control,
                reviewing,
                pending_write: false,
            }),
            busy: BusyFlag::new(),
        })
    }

    /// Session this widget belongs to.
    #[must_use]
    pub const fn session_id(&self) -> &VisitorSessionId {
        &self.session_id
    }

    /// Current transcript.
    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.record.messages.clone()
    }

    /// Whether the reviewing indicator is shown.
    pub async fn is_reviewing(&self) -> bool {
        self.state.lock().await.reviewing
    }

    /// Last observed control state.
    pub async fn control_state(&self) -> ControlState {
        self.state.lock().await.control.state()
    }

    /// Whether a failed write is waiting for the next tick.
    pub async fn has_pending_write(&self) -> bool {
        self.state.lock().await.pending_write
    }

    /// Rolling summary of the conversation.
    pub async fn summary(&self) -> String {
        self.state.lock().await.record.summary.clone()
    }

    /// Everything the visitor sees.
    pub async fn snapshot(&self) -> WidgetSnapshot {
        let state = self.state.lock().await;
        WidgetSnapshot {
            session_id: self.session_id.clone(),
            messages: state.record.messages.clone(),
            is_reviewing: state.reviewing,
            is_human_controlled: state.control.is_human_controlled,
        }
    }

    /// Record a visitor message and answer it when the AI is in control.
    ///
    /// The control flag is read when the message is sent. A reply that is in
    /// flight when an operator takes over is still appended.
    ///
    /// # Errors
    /// Returns an error if the text is empty or the transcript cannot be
    /// written. A failed write keeps the messages locally and is retried on
    /// the next tick. Under AI control the reply (or the apology) is still
    /// appended before the write error is returned.
    pub async fn send_user_message(&self, text: &str) -> SyncResult<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::InvalidMessage(
                "visitor message is empty".to_string(),
            ));
        }

        let control = self.ctx.store.read_control(&self.session_id).await;
        let (message, request, written) = {
            let mut state = self.state.lock().await;
            let request = (!control.state().is_human()).then(|| {
                self.ctx
                    .reply_request(&state.record.summary, &state.record.messages, text)
            });
            let at = next_timestamp(self.ctx.clock.as_ref(), state.record.last_activity_at);
            let message = Message::user(text, at);
            state.record.messages.push(message.clone());
            state.record.touch();
            state.control = control;
            state.reviewing =
                reviewing_indicator(state.control.state(), &state.record.messages);
            let written = self.persist(&mut state).await;
            (message, request, written)
        };

        let Some(request) = request else {
            written?;
            info!(session_id = %self.session_id, "Operator in control, visitor message left for the operator");
            return Ok(SendOutcome {
                message,
                reply: None,
                awaiting_operator: true,
            });
        };

        let max_chars = request.max_chars;
        let (reply_text, answered) = match self.ctx.responder.respond(request).await {
            Ok(text) => {
                let reply = truncate_reply(&text, max_chars);
                if reply.is_empty() {
                    (self.ctx.config.messages.apology.clone(), false)
                } else {
                    (reply, true)
                }
            }
            Err(err) => {
                warn!(session_id = %self.session_id, %err, "Responder failed, sending apology");
                (self.ctx.config.messages.apology.clone(), false)
            }
        };

        let mut state = self.state.lock().await;
        let at = next_timestamp(self.ctx.clock.as_ref(), state.record.last_activity_at);
        let reply = Message::ai(reply_text, at);
        state.record.messages.push(reply.clone());
        state.record.touch();

        let new_turns = if answered {
            vec![message.clone(), reply.clone()]
        } else {
            vec![message.clone()]
        };
        state.record.summary = self.summary.update(&state.record.summary, &new_turns);
        state.reviewing = reviewing_indicator(state.control.state(), &state.record.messages);
        if let Err(err) = written {
            debug!(session_id = %self.session_id, %err, "Visitor message write failed before the reply");
        }
        self.persist(&mut state).await?;

        Ok(SendOutcome {
            message,
            reply: Some(reply),
            awaiting_operator: false,
        })
    }

    /// Reconcile with the CRM mirror and refresh the control flag.
    ///
    /// An unreadable mirror counts as empty for this tick, so pending writes
    /// and the control flag are still refreshed.
    ///
    /// # Errors
    /// Never fails today; write and read failures are logged and retried on
    /// the next tick.
    pub async fn tick(&self) -> SyncResult<TickOutcome> {
        let Some(_guard) = self.busy.try_enter() else {
            return Ok(TickOutcome::Skipped);
        };

        let incoming = match self
            .ctx
            .store
            .read_record(&keys::crm_record(&self.session_id))
            .await
        {
            Ok(record) => record.map(|record| record.messages).unwrap_or_default(),
            Err(err) => {
                warn!(session_id = %self.session_id, %err, "CRM mirror unreadable, skipping merge this tick");
                Vec::new()
            }
        };

        let mut state = self.state.lock().await;
        let outcome = merge_messages(
            &state.record.messages,
            &incoming,
            self.ctx.config.merge.tolerance(),
        );
        let mut report = TickReport {
            merged: outcome.added,
            ..TickReport::default()
        };

        if outcome.changed() {
            state.record.messages = outcome.messages;
            state.record.touch();
            report.rerender = true;
        }

        if outcome.added > 0 || state.pending_write {
            report.wrote = self.persist(&mut state).await.is_ok();
        }

        let control = self.ctx.store.read_control(&self.session_id).await;
        if control != state.control {
            report.rerender = true;
            state.control = control;
        }

        let reviewing = reviewing_indicator(state.control.state(), &state.record.messages);
        if reviewing != state.reviewing {
            report.rerender = true;
            state.reviewing = reviewing;
        }

        debug!(
            session_id = %self.session_id,
            merged = report.merged,
            wrote = report.wrote,
            "Widget tick"
        );
        Ok(TickOutcome::Completed(report))
    }

    async fn persist(&self, state: &mut WidgetState) -> SyncResult<()> {
        state.record.mirror_control(&state.control);
        let key = keys::widget_record(&self.session_id);
        match self.ctx.store.write_record(&key, &state.record).await {
            Ok(()) => {
                state.pending_write = false;
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %self.session_id, %err, "Widget write failed, will retry");
                state.pending_write = true;
                Err(err)
            }
        }
    }
}

impl Reconcile for WidgetActor {
    fn label(&self) -> &'static str {
        "widget"
    }

    fn tick(&self) -> TickFuture<'_> {
        Box::pin(Self::tick(self))
    }
}
