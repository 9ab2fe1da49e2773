//! The responder engine: process-wide state and the event entry point.
//!
//! One [`Responder`] exists per process. It owns the session map, the
//! content and custom-rule stores and the kill-switch flag, and borrows the
//! external world through the transport and data-source traits. The webhook
//! boundary hands every validated messaging event to [`Responder::handle_event`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::bot::content::{ContentStore, CustomRuleStore};
use crate::bot::event::MessagingEvent;
use crate::bot::graph::Transport;
use crate::bot::news::NewsSource;
use crate::bot::outbound::OutboundMessage;
use crate::bot::profile::ProfileResolver;
use crate::bot::session::SessionStore;
use crate::bot::stats::StatsSource;

pub struct Responder {
    pub(crate) admin_sender_id: Option<String>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) stats: Arc<dyn StatsSource>,
    pub(crate) news: Arc<dyn NewsSource>,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) profiles: ProfileResolver,
    pub(crate) content: ContentStore,
    pub(crate) custom: CustomRuleStore,
    stopped: AtomicBool,
}

impl Responder {
    pub fn new(
        admin_sender_id: Option<String>,
        transport: Arc<dyn Transport>,
        stats: Arc<dyn StatsSource>,
        news: Arc<dyn NewsSource>,
        content: ContentStore,
        custom: CustomRuleStore,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let profiles = ProfileResolver::new(sessions.clone(), transport.clone());
        Self {
            admin_sender_id,
            transport,
            stats,
            news,
            sessions,
            profiles,
            content,
            custom,
            stopped: AtomicBool::new(false),
        }
    }

    /// Entry point for one validated messaging event.
    pub async fn handle_event(&self, event: &MessagingEvent) {
        if event.wants_profile() {
            self.profiles.resolve(&event.sender.id).await;
        }
        self.route(event).await;
    }

    /// Best-effort delivery; failures are logged, never retried.
    pub(crate) async fn deliver(&self, recipient_id: &str, message: OutboundMessage) {
        if let Err(e) = self.transport.send(recipient_id, &message).await {
            warn!("send to {recipient_id} failed: {e}");
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    pub(crate) fn set_stopped(&self, stopped: bool) {
        self.stopped.store(stopped, Ordering::Relaxed);
    }

    pub(crate) fn is_admin(&self, sender_id: &str) -> bool {
        self.admin_sender_id.as_deref() == Some(sender_id)
    }
}
