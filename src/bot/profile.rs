//! Lazy profile resolution with per-session caching.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bot::graph::Transport;
use crate::bot::session::{Profile, SessionStore};

/// Fetches a sender's display name on first contact and caches it in the
/// session; later lookups are cache hits with no network call.
pub struct ProfileResolver {
    sessions: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
}

impl ProfileResolver {
    pub fn new(sessions: Arc<SessionStore>, transport: Arc<dyn Transport>) -> Self {
        Self { sessions, transport }
    }

    /// Cached profile, or the result of one fetch attempt. A failed fetch
    /// leaves the session without a profile; the caller falls back to the
    /// "undefined" sentinel for display.
    pub async fn resolve(&self, sender_id: &str) -> Option<Profile> {
        if let Some(profile) = self.sessions.get(sender_id).profile {
            return Some(profile);
        }
        match self.transport.fetch_profile(sender_id).await {
            Ok(profile) => {
                debug!("cached profile for {sender_id}: {}", profile.first_name);
                self.sessions.update(sender_id, |s| s.profile = Some(profile.clone()));
                Some(profile)
            }
            Err(e) => {
                warn!("profile fetch for {sender_id} failed: {e}");
                None
            }
        }
    }
}
