use crate::application_port::RefreshError;
use crate::domain_port::SessionObserver;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct RecordingSessionObserver {
    endings: Mutex<Vec<RefreshError>>,
}

impl RecordingSessionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endings(&self) -> Vec<RefreshError> {
        self.endings.lock().clone()
    }
}

impl SessionObserver for RecordingSessionObserver {
    fn session_ended(&self, reason: &RefreshError) {
        self.endings.lock().push(reason.clone());
    }
}
