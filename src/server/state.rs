//! Application state shared across all request handlers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::sync::actors::{
    ActorContext, CrmActor, Poller, Reconcile, SendOutcome, TickFuture, TickOutcome, TickReport,
    WidgetActor,
};
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::ids::VisitorSessionId;
use crate::sync::store::keys;

/// Upper bound on the idle-eviction sweep period.
const REAP_PERIOD: Duration = Duration::from_secs(60);

struct HostedWidget {
    widget: Arc<WidgetActor>,
    poller: Option<Arc<Notify>>,
    last_used: DateTime<Utc>,
}

/// Shared application state.
///
/// Widgets are polled only once their session has a stored record, and are
/// evicted after `widget.idle_ttl_secs` without visitor activity.
pub struct AppState {
    ctx: ActorContext,
    /// Operator-side actor.
    pub crm: Arc<CrmActor>,
    widgets: DashMap<VisitorSessionId, HostedWidget>,
    pollers: Mutex<Vec<Arc<Notify>>>,
}

impl AppState {
    /// Create the state with one CRM actor and no open widgets.
    ///
    /// # Errors
    /// Returns an error if the CRM actor cannot be built.
    pub fn new(ctx: ActorContext) -> SyncResult<Arc<Self>> {
        let crm = Arc::new(CrmActor::new(ctx.clone())?);
        Ok(Arc::new(Self {
            ctx,
            crm,
            widgets: DashMap::new(),
            pollers: Mutex::new(Vec::new()),
        }))
    }

    /// Start the CRM poll loop.
    pub fn start_crm_poller(&self) {
        let poller = Poller::new(Arc::clone(&self.crm), self.ctx.config.crm.poll_interval());
        self.track(poller.shutdown_notifier());
        drop(poller.spawn());
    }

    /// Start the periodic eviction of idle widgets.
    pub fn start_reaper(self: &Arc<Self>) {
        let period = self.ctx.config.widget.idle_ttl().min(REAP_PERIOD);
        let poller = Poller::new(Arc::clone(self), period);
        self.track(poller.shutdown_notifier());
        drop(poller.spawn());
    }

    /// Open a widget for a new visitor session.
    ///
    /// The widget is not polled until the visitor sends a message.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn create_widget(&self) -> SyncResult<Arc<WidgetActor>> {
        let session_id = VisitorSessionId::generate(self.ctx.clock.now());
        let widget = WidgetActor::open(self.ctx.clone(), session_id).await?;
        info!(session_id = %widget.session_id(), "Created widget session");
        Ok(self.register(widget, false))
    }

    /// Widget of an existing session, reopened from the store if needed.
    ///
    /// # Errors
    /// Returns an error if the session has no stored record or the store
    /// cannot be read.
    pub async fn widget(&self, session_id: &VisitorSessionId) -> SyncResult<Arc<WidgetActor>> {
        if let Some(mut hosted) = self.widgets.get_mut(session_id) {
            hosted.last_used = self.ctx.clock.now();
            return Ok(Arc::clone(&hosted.widget));
        }

        let stored = self
            .ctx
            .store
            .read_record(&keys::widget_record(session_id))
            .await?;
        if stored.is_none() {
            return Err(SyncError::UnknownConversation(session_id.to_string()));
        }

        let widget = WidgetActor::open(self.ctx.clone(), session_id.clone()).await?;
        Ok(self.register(widget, true))
    }

    /// Send a visitor message and make sure the widget is polled from now on.
    ///
    /// # Errors
    /// Same as [`WidgetActor::send_user_message`], plus unknown sessions.
    pub async fn send_visitor_message(
        &self,
        session_id: &VisitorSessionId,
        text: &str,
    ) -> SyncResult<SendOutcome> {
        let widget = self.widget(session_id).await?;
        let outcome = widget.send_user_message(text).await;
        if !matches!(outcome, Err(SyncError::InvalidMessage(_))) {
            self.start_polling(session_id);
        }
        outcome
    }

    /// Evict widgets idle for longer than `widget.idle_ttl_secs`.
    ///
    /// Widgets with a write still pending are kept until it lands. Returns
    /// the number of evicted widgets.
    pub async fn reap_idle(&self) -> usize {
        let now = self.ctx.clock.now();
        let ttl = self.ctx.config.widget.idle_ttl();
        let idle: Vec<(VisitorSessionId, Arc<WidgetActor>, DateTime<Utc>)> = self
            .widgets
            .iter()
            .filter(|hosted| {
                (now - hosted.last_used)
                    .to_std()
                    .is_ok_and(|elapsed| elapsed >= ttl)
            })
            .map(|hosted| {
                (
                    hosted.key().clone(),
                    Arc::clone(&hosted.widget),
                    hosted.last_used,
                )
            })
            .collect();

        let mut reaped = 0;
        for (session_id, widget, observed) in idle {
            if widget.has_pending_write().await {
                debug!(%session_id, "Keeping idle widget until its write lands");
                continue;
            }
            let removed = self
                .widgets
                .remove_if(&session_id, |_, hosted| hosted.last_used == observed);
            if let Some((_, hosted)) = removed {
                if let Some(notify) = hosted.poller {
                    notify.notify_one();
                }
                reaped += 1;
            }
        }

        if reaped > 0 {
            info!(reaped, remaining = self.widgets.len(), "Evicted idle widgets");
        }
        reaped
    }

    /// Number of widgets currently hosted.
    #[must_use]
    pub fn hosted_widgets(&self) -> usize {
        self.widgets.len()
    }

    /// Number of hosted widgets with a running poller.
    #[must_use]
    pub fn polled_widgets(&self) -> usize {
        self.widgets
            .iter()
            .filter(|hosted| hosted.poller.is_some())
            .count()
    }

    /// Stop every poller started by this state.
    pub fn shutdown(&self) {
        if let Ok(mut pollers) = self.pollers.lock() {
            for notify in pollers.drain(..) {
                notify.notify_one();
            }
        }
        for hosted in self.widgets.iter() {
            if let Some(notify) = &hosted.poller {
                notify.notify_one();
            }
        }
        self.widgets.clear();
        info!("Pollers stopped");
    }

    fn register(&self, widget: WidgetActor, poll: bool) -> Arc<WidgetActor> {
        let now = self.ctx.clock.now();
        match self.widgets.entry(widget.session_id().clone()) {
            Entry::Occupied(mut existing) => {
                let hosted = existing.get_mut();
                hosted.last_used = now;
                if poll && hosted.poller.is_none() {
                    hosted.poller = Some(self.spawn_widget_poller(&hosted.widget));
                }
                Arc::clone(&hosted.widget)
            }
            Entry::Vacant(slot) => {
                let widget = Arc::new(widget);
                let poller = poll.then(|| self.spawn_widget_poller(&widget));
                slot.insert(HostedWidget {
                    widget: Arc::clone(&widget),
                    poller,
                    last_used: now,
                });
                widget
            }
        }
    }

    fn start_polling(&self, session_id: &VisitorSessionId) {
        if let Some(mut hosted) = self.widgets.get_mut(session_id) {
            if hosted.poller.is_none() {
                let notify = self.spawn_widget_poller(&hosted.widget);
                hosted.poller = Some(notify);
            }
        }
    }

    fn spawn_widget_poller(&self, widget: &Arc<WidgetActor>) -> Arc<Notify> {
        let poller = Poller::new(Arc::clone(widget), self.ctx.config.widget.poll_interval());
        let notify = poller.shutdown_notifier();
        drop(poller.spawn());
        notify
    }

    fn track(&self, notify: Arc<Notify>) {
        if let Ok(mut pollers) = self.pollers.lock() {
            pollers.push(notify);
        }
    }
}

impl Reconcile for AppState {
    fn label(&self) -> &'static str {
        "reaper"
    }

    fn tick(&self) -> TickFuture<'_> {
        Box::pin(async move {
            let reaped = self.reap_idle().await;
            Ok(TickOutcome::Completed(TickReport {
                rerender: reaped > 0,
                ..TickReport::default()
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::responder::testing::ScriptedResponder;
    use crate::sync::core::clock::ManualClock;
    use crate::sync::core::config::SyncConfig;
    use crate::sync::store::adapter::StoreAdapter;
    use crate::sync::store::memory_store::MemoryStore;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    fn state(clock: Arc<ManualClock>) -> Arc<AppState> {
        let mut config = SyncConfig::default();
        config.widget.idle_ttl_secs = 60;
        let ctx = ActorContext::new(
            StoreAdapter::new(Arc::new(MemoryStore::new())),
            Arc::new(ScriptedResponder::replying("ok")),
            config,
        )
        .unwrap()
        .with_clock(clock);
        AppState::new(ctx).unwrap()
    }

    #[tokio::test]
    async fn test_widgets_polled_only_after_first_message() {
        let state = state(clock());
        let _quiet = state.create_widget().await.unwrap();
        let active = state.create_widget().await.unwrap();
        assert_eq!(state.hosted_widgets(), 2);
        assert_eq!(state.polled_widgets(), 0);

        assert!(state.send_visitor_message(active.session_id(), "  ").await.is_err());
        assert_eq!(state.polled_widgets(), 0);

        state
            .send_visitor_message(active.session_id(), "hello")
            .await
            .unwrap();
        assert_eq!(state.polled_widgets(), 1);
        state.shutdown();
        assert_eq!(state.hosted_widgets(), 0);
    }

    #[tokio::test]
    async fn test_idle_widgets_are_evicted() {
        let clock = clock();
        let state = state(clock.clone());
        let quiet = state.create_widget().await.unwrap().session_id().clone();
        let active = state.create_widget().await.unwrap().session_id().clone();
        state.send_visitor_message(&active, "hello").await.unwrap();

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(state.reap_idle().await, 0);
        state.widget(&active).await.unwrap();

        clock.advance(chrono::Duration::seconds(40));
        assert_eq!(state.reap_idle().await, 1);
        assert_eq!(state.hosted_widgets(), 1);
        assert!(matches!(
            state.widget(&quiet).await,
            Err(SyncError::UnknownConversation(_))
        ));

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(state.reap_idle().await, 1);
        assert_eq!(state.hosted_widgets(), 0);
        assert_eq!(state.polled_widgets(), 0);

        let reopened = state.widget(&active).await.unwrap();
        assert_eq!(reopened.transcript().await.len(), 2);
        assert_eq!(state.polled_widgets(), 1);
        state.shutdown();
    }
}
