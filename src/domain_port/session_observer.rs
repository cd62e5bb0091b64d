use crate::application_port::RefreshError;

/// Told when the authenticated session ends because a refresh failed.
pub trait SessionObserver: Send + Sync {
    fn session_ended(&self, reason: &RefreshError);
}
