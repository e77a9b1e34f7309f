//! Operator-facing actor.
//!
//! Mirrors every visitor conversation into `crm_conversation_<id>`, keeps the
//! `crm_conversations` list current and is the only writer of the control
//! records.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::llm::responder::truncate_reply;
use crate::sync::actors::context::ActorContext;
use crate::sync::actors::poller::{BusyFlag, Reconcile, TickFuture, TickOutcome, TickReport};
use crate::sync::core::clock::next_timestamp;
use crate::sync::core::control::{ControlAction, ControlRecord, ControlState};
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::VisitorSessionId;
use crate::sync::core::message::{Message, Sender, awaiting_reply, last_turn};
use crate::sync::merge::engine::merge_messages;
use crate::sync::store::keys;
use crate::sync::store::record::{ConversationRecord, ConversationSummary};
use crate::sync::summary::rolling::RollingSummary;

/// Operator view of one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmConversationView {
    /// Visitor session id.
    pub session_id: VisitorSessionId,
    /// Reconciled transcript.
    pub messages: Vec<Message>,
    /// Current control state.
    pub control: ControlState,
    /// Rolling summary.
    pub summary: String,
}

struct CrmConversation {
    record: ConversationRecord,
    control: ControlRecord,
    pending_write: bool,
}

impl CrmConversation {
    fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.record.session_id.clone(),
            last_message: last_turn(&self.record.messages)
                .map(|m| m.text.clone())
                .unwrap_or_default(),
            timestamp: self.record.last_activity_at,
            is_human_controlled: self.control.is_human_controlled,
        }
    }

    fn view(&self) -> CrmConversationView {
        CrmConversationView {
            session_id: self.record.session_id.clone(),
            messages: self.record.messages.clone(),
            control: self.control.state(),
            summary: self.record.summary.clone(),
        }
    }
}

#[derive(Default)]
struct CrmState {
    conversations: BTreeMap<VisitorSessionId, CrmConversation>,
    selected: Option<VisitorSessionId>,
    published: Option<Vec<ConversationSummary>>,
}

/// Operator-side actor over all conversations of the store.
pub struct CrmActor {
    ctx: ActorContext,
    summary: RollingSummary,
    state: Mutex<CrmState>,
    busy: BusyFlag,
}

impl CrmActor {
    /// Create a CRM actor with no conversations loaded yet.
    ///
    /// # Errors
    /// Returns an error if the summary tokenizer cannot be built.
    pub fn new(ctx: ActorContext) -> SyncResult<Self> {
        let summary = ctx.rolling_summary()?;
        Ok(Self {
            ctx,
            summary,
            state: Mutex::new(CrmState::default()),
            busy: BusyFlag::new(),
        })
    }

    /// Conversation list, most recent activity first.
    pub async fn conversations(&self) -> Vec<ConversationSummary> {
        let state = self.state.lock().await;
        sorted_summaries(&state.conversations)
    }

    /// Operator view of one conversation.
    pub async fn conversation(&self, session_id: &VisitorSessionId) -> Option<CrmConversationView> {
        let state = self.state.lock().await;
        state.conversations.get(session_id).map(CrmConversation::view)
    }

    /// Make `session_id` the conversation the operator is looking at.
    ///
    /// # Errors
    /// Returns an error if the conversation is unknown.
    pub async fn select(&self, session_id: &VisitorSessionId) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        if !state.conversations.contains_key(session_id) {
            return Err(unknown(session_id));
        }
        state.selected = Some(session_id.clone());
        Ok(())
    }

    /// Conversation the operator is looking at.
    pub async fn selected(&self) -> Option<VisitorSessionId> {
        self.state.lock().await.selected.clone()
    }

    /// Suspend automatic replies. Returns `false` when already human-controlled.
    ///
    /// # Errors
    /// Returns an error if the conversation is unknown or the control record
    /// cannot be written.
    pub async fn take_control(&self, session_id: &VisitorSessionId) -> SyncResult<bool> {
        self.transition(session_id, ControlAction::TakeControl).await
    }

    /// Resume automatic replies. Returns `false` when already AI-controlled.
    ///
    /// # Errors
    /// Returns an error if the conversation is unknown or the control record
    /// cannot be written.
    pub async fn hand_back_to_ai(&self, session_id: &VisitorSessionId) -> SyncResult<bool> {
        self.transition(session_id, ControlAction::HandBackToAi).await
    }

    /// Send an operator message, taking control first if needed.
    ///
    /// # Errors
    /// Returns an error if the text is empty, the conversation is unknown, or
    /// the transcript cannot be written. A failed transcript write keeps the
    /// message locally and is retried on the next tick.
    pub async fn send_operator_message(
        &self,
        session_id: &VisitorSessionId,
        text: &str,
    ) -> SyncResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyncError::InvalidMessage(
                "operator message is empty".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(session_id)
            .ok_or_else(|| unknown(session_id))?;

        self.apply_transition(conversation, ControlAction::TakeControl)
            .await?;

        let at = next_timestamp(self.ctx.clock.as_ref(), conversation.record.last_activity_at);
        let message = Message::operator(text, at);
        conversation.record.messages.push(message.clone());
        conversation.record.touch();
        self.persist(conversation).await?;
        self.publish(&mut state).await;

        Ok(message)
    }

    /// Ask the responder to answer the latest unanswered visitor message of
    /// an AI-controlled conversation.
    ///
    /// Returns `None` when the conversation is human-controlled or nothing is
    /// waiting for an answer.
    ///
    /// # Errors
    /// Returns an error if the conversation is unknown or the transcript
    /// cannot be written.
    pub async fn send_ai_fallback(&self, session_id: &VisitorSessionId) -> SyncResult<Option<Message>> {
        let control = self.ctx.store.read_control(session_id).await;
        let (request, question) = {
            let mut state = self.state.lock().await;
            let conversation = state
                .conversations
                .get_mut(session_id)
                .ok_or_else(|| unknown(session_id))?;
            conversation.control = control;

            if conversation.control.state().is_human() || !awaiting_reply(&conversation.record.messages) {
                debug!(%session_id, "AI fallback not applicable");
                return Ok(None);
            }

            let messages = &conversation.record.messages;
            let Some(index) = messages.iter().rposition(|m| m.is_turn() && m.sender == Sender::User) else {
                return Ok(None);
            };
            let question = messages[index].clone();
            let request = self.ctx.reply_request(
                &conversation.record.summary,
                &messages[..index],
                &question.text,
            );
            (request, question)
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
                warn!(%session_id, %err, "Responder failed on AI fallback, sending apology");
                (self.ctx.config.messages.apology.clone(), false)
            }
        };

        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(session_id)
            .ok_or_else(|| unknown(session_id))?;

        let at = next_timestamp(self.ctx.clock.as_ref(), conversation.record.last_activity_at);
        let reply = Message::ai(reply_text, at);
        conversation.record.messages.push(reply.clone());
        conversation.record.touch();
        if answered {
            conversation.record.summary = self
                .summary
                .update(&conversation.record.summary, &[question, reply.clone()]);
        }
        info!(%session_id, "AI fallback reply sent");
        self.persist(conversation).await?;
        self.publish(&mut state).await;

        Ok(Some(reply))
    }

    /// Pull every visitor record, merge it into the mirrors and refresh the
    /// control flags and the conversation list.
    ///
    /// # Errors
    /// Returns an error if the visitor records cannot be listed. Unreadable
    /// individual records and failed writes are logged and retried.
    pub async fn tick(&self) -> SyncResult<TickOutcome> {
        let Some(_guard) = self.busy.try_enter() else {
            return Ok(TickOutcome::Skipped);
        };

        let widget_keys = self
            .ctx
            .store
            .keys_with_prefix(keys::WIDGET_RECORD_PREFIX)
            .await?;

        let mut report = TickReport::default();
        let mut state = self.state.lock().await;

        for key in widget_keys {
            let Some(session_id) = keys::session_from_widget_key(&key) else {
                warn!(%key, "Skipping widget record with an invalid session id");
                continue;
            };

            let widget = match self.ctx.store.read_record(&key).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%session_id, %err, "Skipping unreadable widget record");
                    continue;
                }
            };

            if !state.conversations.contains_key(&session_id) {
                let conversation = match self.restore(&session_id).await {
                    Ok(conversation) => conversation,
                    Err(err) => {
                        warn!(%session_id, %err, "CRM mirror unavailable, retrying next tick");
                        continue;
                    }
                };
                info!(%session_id, "New conversation");
                state.conversations.insert(session_id.clone(), conversation);
                report.rerender = true;
            }
            let Some(conversation) = state.conversations.get_mut(&session_id) else {
                continue;
            };

            let outcome = merge_messages(
                &conversation.record.messages,
                &widget.messages,
                self.ctx.config.merge.tolerance(),
            );
            let summary_changed =
                !widget.summary.is_empty() && widget.summary != conversation.record.summary;

            if outcome.changed() {
                report.merged += outcome.added;
                conversation.record.messages = outcome.messages;
                conversation.record.touch();
                report.rerender = true;
            }
            if summary_changed {
                conversation.record.summary = widget.summary;
            }

            let control = self.ctx.store.read_control(&session_id).await;
            let control_changed = control != conversation.control;
            if control_changed {
                conversation.control = control;
                report.rerender = true;
            }

            if outcome.added > 0 || summary_changed || conversation.pending_write {
                report.wrote |= self.persist(conversation).await.is_ok();
            }
        }

        report.wrote |= self.publish(&mut state).await;

        debug!(
            conversations = state.conversations.len(),
            merged = report.merged,
            wrote = report.wrote,
            "CRM tick"
        );
        Ok(TickOutcome::Completed(report))
    }

    /// Load the stored mirror of a conversation seen for the first time.
    ///
    /// Only an undecodable mirror is rebuilt from scratch. Any other read
    /// failure is returned so the mirror is not overwritten with less data.
    async fn restore(&self, session_id: &VisitorSessionId) -> SyncResult<CrmConversation> {
        let record = match self.ctx.store.read_record(&keys::crm_record(session_id)).await {
            Ok(Some(record)) if &record.session_id == session_id => record,
            Ok(_) => ConversationRecord::new(session_id.clone()),
            Err(SyncError::Serialization(err)) => {
                warn!(%session_id, %err, "CRM mirror undecodable, rebuilding from widget record");
                ConversationRecord::new(session_id.clone())
            }
            Err(err) => return Err(err),
        };
        Ok(CrmConversation {
            record,
            control: self.ctx.store.read_control(session_id).await,
            pending_write: false,
        })
    }

    async fn transition(&self, session_id: &VisitorSessionId, action: ControlAction) -> SyncResult<bool> {
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(session_id)
            .ok_or_else(|| unknown(session_id))?;

        let changed = self.apply_transition(conversation, action).await?;
        if changed {
            self.publish(&mut state).await;
        }
        Ok(changed)
    }

    /// Apply `action` against the stored control flag.
    ///
    /// The flag is re-read first so a stale local copy cannot produce a
    /// second flip. The transcript write after a successful flip is retried
    /// on failure rather than reported.
    async fn apply_transition(
        &self,
        conversation: &mut CrmConversation,
        action: ControlAction,
    ) -> SyncResult<bool> {
        let session_id = conversation.record.session_id.clone();
        let current = self.ctx.store.read_control(&session_id).await;

        let Some(next) = action.apply(current.state()) else {
            debug!(%session_id, ?action, "Control action does not apply, ignoring");
            conversation.control = current;
            return Ok(false);
        };

        let at = next_timestamp(self.ctx.clock.as_ref(), conversation.record.last_activity_at);
        let control = ControlRecord::flipped(next, at);
        self.ctx.store.write_control(&session_id, &control).await?;
        conversation.control = control;

        let text = match next {
            ControlState::HumanControlled => &self.ctx.config.messages.operator_joined,
            ControlState::AiControlled => &self.ctx.config.messages.ai_resumed,
        };
        conversation.record.messages.push(Message::system(text.clone(), at));
        conversation.record.touch();
        info!(%session_id, state = ?next, "Control changed");

        if let Err(err) = self.persist(conversation).await {
            debug!(%session_id, %err, "Control annotation will be written on the next tick");
        }
        Ok(true)
    }

    async fn persist(&self, conversation: &mut CrmConversation) -> SyncResult<()> {
        conversation.record.mirror_control(&conversation.control);
        let key = keys::crm_record(&conversation.record.session_id);
        match self.ctx.store.write_record(&key, &conversation.record).await {
            Ok(()) => {
                conversation.pending_write = false;
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %conversation.record.session_id, %err, "CRM write failed, will retry");
                conversation.pending_write = true;
                Err(err)
            }
        }
    }

    /// Write the conversation list if it differs from the last one written.
    async fn publish(&self, state: &mut CrmState) -> bool {
        let summaries = sorted_summaries(&state.conversations);
        if state.published.as_ref() == Some(&summaries) {
            return false;
        }
        match self.ctx.store.write_summaries(&summaries).await {
            Ok(()) => {
                state.published = Some(summaries);
                true
            }
            Err(err) => {
                warn!(%err, "Conversation list write failed, will retry");
                false
            }
        }
    }
}

impl Reconcile for CrmActor {
    fn label(&self) -> &'static str {
        "crm"
    }

    fn tick(&self) -> TickFuture<'_> {
        Box::pin(Self::tick(self))
    }
}

fn sorted_summaries(
    conversations: &BTreeMap<VisitorSessionId, CrmConversation>,
) -> Vec<ConversationSummary> {
    let mut summaries: Vec<ConversationSummary> =
        conversations.values().map(CrmConversation::summary).collect();
    summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    summaries
}

fn unknown(session_id: &VisitorSessionId) -> SyncError {
    SyncError::UnknownConversation(session_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::responder::testing::ScriptedResponder;
    use crate::sync::actors::widget::WidgetActor;
    use crate::sync::core::config::SyncConfig;
    use crate::sync::store::adapter::StoreAdapter;
    use crate::sync::store::memory_store::MemoryStore;
    use crate::sync::store::shared_store::SharedStore;
    use crate::sync::store::testing::FlakyStore;
    use std::sync::Arc;

    fn context(store: Arc<dyn SharedStore>, responder: Arc<ScriptedResponder>) -> ActorContext {
        ActorContext::new(StoreAdapter::new(store), responder, SyncConfig::default()).unwrap()
    }

    fn session() -> VisitorSessionId {
        VisitorSessionId::new("session_1700000000000_abcdefghi").unwrap()
    }

    async fn seeded(
        store: Arc<dyn SharedStore>,
        responder: Arc<ScriptedResponder>,
        first_message: &str,
    ) -> (WidgetActor, CrmActor) {
        let ctx = context(store, responder);
        let widget = WidgetActor::open(ctx.clone(), session()).await.unwrap();
        widget.send_user_message(first_message).await.unwrap();
        let crm = CrmActor::new(ctx).unwrap();
        crm.tick().await.unwrap();
        (widget, crm)
    }

    fn system_count(view: &CrmConversationView) -> usize {
        view.messages.iter().filter(|m| m.is_system).count()
    }

    #[tokio::test]
    async fn test_tick_discovers_conversations() {
        let store = Arc::new(MemoryStore::new());
        let (_widget, crm) = seeded(
            store.clone(),
            Arc::new(ScriptedResponder::replying("Hi! How can I help?")),
            "hello",
        )
        .await;

        let list = crm.conversations().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, session());
        assert_eq!(list[0].last_message, "Hi! How can I help?");
        assert!(!list[0].is_human_controlled);

        let stored = StoreAdapter::new(store).read_summaries().await.unwrap();
        assert_eq!(stored, list);
        assert_eq!(crm.conversation(&session()).await.unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_take_control_is_exclusive() {
        let store = Arc::new(MemoryStore::new());
        let (_widget, crm) =
            seeded(store, Arc::new(ScriptedResponder::replying("ok")), "help").await;

        assert!(crm.take_control(&session()).await.unwrap());
        assert!(!crm.take_control(&session()).await.unwrap());

        let view = crm.conversation(&session()).await.unwrap();
        assert_eq!(view.control, ControlState::HumanControlled);
        assert_eq!(system_count(&view), 1);
        assert_eq!(
            view.messages.last().unwrap().text,
            "An operator has joined the conversation"
        );
    }

    #[tokio::test]
    async fn test_hand_back_only_from_human() {
        let store = Arc::new(MemoryStore::new());
        let (_widget, crm) =
            seeded(store, Arc::new(ScriptedResponder::replying("ok")), "help").await;

        assert!(!crm.hand_back_to_ai(&session()).await.unwrap());
        assert!(crm.take_control(&session()).await.unwrap());
        assert!(crm.hand_back_to_ai(&session()).await.unwrap());

        let view = crm.conversation(&session()).await.unwrap();
        assert_eq!(view.control, ControlState::AiControlled);
        assert_eq!(system_count(&view), 2);
        assert_eq!(view.messages.last().unwrap().text, "AI has resumed the conversation");
    }

    #[tokio::test]
    async fn test_operator_message_reaches_widget() {
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(ScriptedResponder::replying("ok"));
        let (widget, crm) = seeded(store, responder.clone(), "I need a human").await;

        let sent = crm
            .send_operator_message(&session(), "Hi, I'm Ana from support")
            .await
            .unwrap();
        assert_eq!(sent.sender, Sender::Operator);

        let view = crm.conversation(&session()).await.unwrap();
        assert_eq!(view.control, ControlState::HumanControlled);

        let tick = widget.tick().await.unwrap();
        assert_eq!(tick.report().unwrap().merged, 2);
        assert_eq!(widget.control_state().await, ControlState::HumanControlled);
        assert!(widget.transcript().await.contains(&sent));

        widget.send_user_message("thanks Ana").await.unwrap();
        assert_eq!(responder.calls(), 1);
        assert!(widget.is_reviewing().await);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let crm = CrmActor::new(context(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedResponder::replying("ok")),
        ))
        .unwrap();
        let missing = session();
        assert!(matches!(
            crm.take_control(&missing).await,
            Err(SyncError::UnknownConversation(_))
        ));
        assert!(crm.select(&missing).await.is_err());
        assert!(crm.selected().await.is_none());
    }

    #[tokio::test]
    async fn test_ai_fallback_answers_waiting_visitor() {
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(ScriptedResponder::replying("Your order left today."));
        let ctx = context(store, responder.clone());

        let mut record = ConversationRecord::new(session());
        record.messages.push(Message::user("where is my order", chrono::Utc::now()));
        ctx.store
            .write_record(&keys::widget_record(&session()), &record)
            .await
            .unwrap();

        let crm = CrmActor::new(ctx).unwrap();
        crm.tick().await.unwrap();
        crm.select(&session()).await.unwrap();
        assert_eq!(crm.selected().await, Some(session()));

        let reply = crm.send_ai_fallback(&session()).await.unwrap().unwrap();
        assert_eq!(reply.sender, Sender::Ai);
        assert_eq!(reply.text, "Your order left today.");
        assert_eq!(responder.last_request().unwrap().user_message, "where is my order");

        assert!(crm.send_ai_fallback(&session()).await.unwrap().is_none());
        assert_eq!(responder.calls(), 1);
    }

    #[tokio::test]
    async fn test_ai_fallback_skipped_under_human_control() {
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(ScriptedResponder::replying("ok"));
        let (_widget, crm) = seeded(store, responder.clone(), "hi").await;
        crm.take_control(&session()).await.unwrap();
        assert!(crm.send_ai_fallback(&session()).await.unwrap().is_none());
        assert_eq!(responder.calls(), 1);
    }

    #[tokio::test]
    async fn test_idle_tick_writes_nothing() {
        let store = Arc::new(FlakyStore::new());
        let (_widget, crm) =
            seeded(store.clone(), Arc::new(ScriptedResponder::replying("ok")), "hi").await;

        let writes = store.writes();
        let outcome = crm.tick().await.unwrap();
        assert_eq!(outcome.report(), Some(&TickReport::default()));
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn test_failed_mirror_write_retried() {
        let store = Arc::new(FlakyStore::new());
        let ctx = context(store.clone(), Arc::new(ScriptedResponder::replying("ok")));
        let widget = WidgetActor::open(ctx.clone(), session()).await.unwrap();
        widget.send_user_message("hi").await.unwrap();
        let crm = CrmActor::new(ctx.clone()).unwrap();

        store.set_fail_writes(true);
        let failed = crm.tick().await.unwrap();
        assert!(!failed.report().unwrap().wrote);
        assert_eq!(crm.conversation(&session()).await.unwrap().messages.len(), 2);

        store.set_fail_writes(false);
        let retried = crm.tick().await.unwrap();
        assert!(retried.report().unwrap().wrote);
        let mirror = ctx
            .store
            .read_record(&keys::crm_record(&session()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mirror.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_restart_keeps_mirror_through_transient_read_failure() {
        let store = Arc::new(FlakyStore::new());
        let responder = Arc::new(ScriptedResponder::replying("ok"));
        let (_widget, crm) = seeded(store.clone(), responder.clone(), "hi").await;
        crm.send_operator_message(&session(), "Hi I'm Ana")
            .await
            .unwrap();

        let restarted = CrmActor::new(context(store.clone(), responder)).unwrap();
        store.set_fail_reads_with_prefix(Some(keys::CRM_RECORD_PREFIX));
        restarted.tick().await.unwrap();
        assert!(restarted.conversation(&session()).await.is_none());

        store.set_fail_reads_with_prefix(None);
        restarted.tick().await.unwrap();
        let view = restarted.conversation(&session()).await.unwrap();
        let texts: Vec<&str> = view.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["hi", "ok", "An operator has joined the conversation", "Hi I'm Ana"]
        );

        let mirror = StoreAdapter::new(store)
            .read_record(&keys::crm_record(&session()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mirror.messages, view.messages);
    }

    #[tokio::test]
    async fn test_undecodable_mirror_rebuilt_from_widget() {
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(ScriptedResponder::replying("ok"));
        let (_widget, _crm) = seeded(store.clone(), responder.clone(), "hi").await;
        store
            .write(&keys::crm_record(&session()), "not json".to_string())
            .await
            .unwrap();

        let restarted = CrmActor::new(context(store, responder)).unwrap();
        restarted.tick().await.unwrap();
        let view = restarted.conversation(&session()).await.unwrap();
        assert_eq!(view.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_restart_restores_mirror() {
        let store = Arc::new(MemoryStore::new());
        let responder = Arc::new(ScriptedResponder::replying("ok"));
        let (_widget, crm) = seeded(store.clone(), responder.clone(), "hi").await;
        crm.take_control(&session()).await.unwrap();

        let restarted = CrmActor::new(context(store, responder)).unwrap();
        restarted.tick().await.unwrap();
        let view = restarted.conversation(&session()).await.unwrap();
        assert_eq!(view.control, ControlState::HumanControlled);
        assert_eq!(system_count(&view), 1);
    }
}
