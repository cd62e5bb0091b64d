use crate::application_port::RefreshError;
use crate::domain_model::*;
use crate::domain_port::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

enum Behavior {
    Respond(Result<TokenPair, RefreshError>),
    Hang,
}

/// Credential-issuing endpoint double. Counts exchanges and can be held
/// open until the test releases it.
pub struct FakeRefreshExchange {
    behavior: Behavior,
    calls: AtomicUsize,
    presented: Mutex<Vec<RefreshToken>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeRefreshExchange {
    pub fn issuing(pair: TokenPair) -> Self {
        Self::with_behavior(Behavior::Respond(Ok(pair)))
    }

    pub fn failing(error: RefreshError) -> Self {
        Self::with_behavior(Behavior::Respond(Err(error)))
    }

    pub fn hanging() -> Self {
        Self::with_behavior(Behavior::Hang)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            presented: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Hold every exchange until a permit is added to the returned gate.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn presented(&self) -> Vec<RefreshToken> {
        self.presented.lock().clone()
    }
}

#[async_trait::async_trait]
impl RefreshExchange for FakeRefreshExchange {
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<TokenPair, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.presented.lock().push(refresh_token.clone());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| RefreshError::Transport(e.to_string()))?
                .forget();
        }

        match &self.behavior {
            Behavior::Respond(outcome) => outcome.clone(),
            Behavior::Hang => std::future::pending().await,
        }
    }
}
