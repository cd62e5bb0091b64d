use crate::application_port::RefreshError;
use crate::domain_port::SessionObserver;
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Active,
    /// The credential could not be refreshed; the user has to log in again.
    Ended {
        login_path: String,
        reason: RefreshError,
    },
}

/// Publishes session endings on a watch channel so the embedding application
/// can send the user to its login surface.
pub struct WatchSessionObserver {
    login_path: String,
    events: watch::Sender<SessionEvent>,
}

impl WatchSessionObserver {
    pub fn new(login_path: impl Into<String>) -> Self {
        let (events, _) = watch::channel(SessionEvent::Active);
        Self {
            login_path: login_path.into(),
            events,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Back to `Active` after a new login.
    pub fn reset(&self) {
        self.events.send_replace(SessionEvent::Active);
    }
}

impl SessionObserver for WatchSessionObserver {
    fn session_ended(&self, reason: &RefreshError) {
        warn!(login_path = %self.login_path, error = %reason, "session ended");
        self.events.send_replace(SessionEvent::Ended {
            login_path: self.login_path.clone(),
            reason: reason.clone(),
        });
    }
}
